//! Scope reads and the atomic write path for the InMemory backend.

use std::collections::{HashMap, HashSet};

use super::{InMemory, ScopeState};
use crate::{
    Result,
    backend::{ScopeSnapshot, WriteOp, errors::BackendError},
    merge::{self, MergeQuery},
    position,
    projection::CollectionItem,
    types::{OrderingRecord, RecordId, Resource, ResourceId, Scope},
};

fn sorted_records(state: Option<&ScopeState>) -> Vec<OrderingRecord> {
    let mut records: Vec<OrderingRecord> = state
        .map(|s| s.records.values().cloned().collect())
        .unwrap_or_default();
    records.sort_by_key(|r| r.position);
    records
}

pub(crate) async fn find_by_key(
    backend: &InMemory,
    scope: &Scope,
    resource_id: &ResourceId,
) -> Result<Option<OrderingRecord>> {
    let scopes = backend.scopes.read().await;
    Ok(scopes.get(scope).and_then(|state| {
        state
            .records
            .values()
            .find(|r| &r.resource_id == resource_id)
            .cloned()
    }))
}

pub(crate) async fn find_scope(backend: &InMemory, scope: &Scope) -> Result<ScopeSnapshot> {
    let scopes = backend.scopes.read().await;
    let state = scopes.get(scope);
    Ok(ScopeSnapshot {
        version: state.map_or(0, |s| s.version),
        records: sorted_records(state),
    })
}

/// Checks the invariants every stored scope holds: each record belongs to
/// `scope`, record ids and resource ids appear once, and positions are dense.
pub(crate) fn check_scope<'a>(
    scope: &Scope,
    records: impl IntoIterator<Item = &'a OrderingRecord>,
) -> Result<()> {
    let mut ids = HashSet::new();
    let mut resources = HashSet::new();
    let mut positions = Vec::new();
    for record in records {
        if record.owner != scope.owner || record.resource_type != scope.resource_type {
            return Err(BackendError::StateInconsistency {
                reason: format!("record {} does not belong to scope {scope}", record.id),
            }
            .into());
        }
        if !ids.insert(record.id) {
            return Err(BackendError::StateInconsistency {
                reason: format!("record {} appears twice in scope {scope}", record.id),
            }
            .into());
        }
        if !resources.insert(&record.resource_id) {
            return Err(BackendError::StateInconsistency {
                reason: format!(
                    "resource {} is ordered twice in scope {scope}",
                    record.resource_id
                ),
            }
            .into());
        }
        positions.push(record.position);
    }
    if !position::is_dense(positions) {
        return Err(BackendError::StateInconsistency {
            reason: format!("positions of scope {scope} are not dense"),
        }
        .into());
    }
    Ok(())
}

/// Applies a batch of writes to one scope.
///
/// The batch is staged on a copy of the scope and only swapped in once every
/// write succeeded and the staged scope is still dense. The scope map's write
/// lock is held throughout, so no reader sees the intermediate state.
pub(crate) async fn apply(
    backend: &InMemory,
    scope: &Scope,
    expected_version: u64,
    writes: Vec<WriteOp>,
) -> Result<()> {
    let mut scopes = backend.scopes.write().await;
    let current = scopes.get(scope);
    let actual = current.map_or(0, |s| s.version);
    if actual != expected_version {
        return Err(BackendError::ScopeVersionConflict {
            scope: scope.clone(),
            expected: expected_version,
            actual,
        }
        .into());
    }

    let mut staged: HashMap<RecordId, OrderingRecord> =
        current.map(|s| s.records.clone()).unwrap_or_default();
    for write in writes {
        match write {
            WriteOp::Insert(record) => {
                if record.owner != scope.owner || record.resource_type != scope.resource_type {
                    return Err(BackendError::StateInconsistency {
                        reason: format!("record {} does not belong to scope {scope}", record.id),
                    }
                    .into());
                }
                if staged
                    .values()
                    .any(|r| r.resource_id == record.resource_id)
                {
                    return Err(BackendError::DuplicateOrderingKey {
                        scope: scope.clone(),
                        resource_id: record.resource_id,
                    }
                    .into());
                }
                staged.insert(record.id, record);
            }
            WriteOp::SetPosition {
                id,
                position,
                updated_at,
            } => {
                let record = staged
                    .get_mut(&id)
                    .ok_or(BackendError::RecordNotFound { id })?;
                record.position = position;
                record.updated_at = updated_at;
            }
            WriteOp::Delete { id } => {
                staged
                    .remove(&id)
                    .ok_or(BackendError::RecordNotFound { id })?;
            }
        }
    }

    check_scope(scope, staged.values())?;

    scopes.insert(
        scope.clone(),
        ScopeState {
            version: actual + 1,
            records: staged,
        },
    );
    Ok(())
}

pub(crate) async fn join_resources(
    backend: &InMemory,
    scope: &Scope,
) -> Result<Vec<(OrderingRecord, Resource)>> {
    // Lock order: scopes before collections.
    let scopes = backend.scopes.read().await;
    let collections = backend.collections.read().await;
    let items = collections.get(&scope.resource_type);
    Ok(sorted_records(scopes.get(scope))
        .into_iter()
        .filter_map(|record| {
            let resource = items?.get(&record.resource_id)?.clone();
            Some((record, resource))
        })
        .collect())
}

pub(crate) async fn left_join_merge(
    backend: &InMemory,
    scope: &Scope,
    query: &MergeQuery,
) -> Result<Vec<CollectionItem>> {
    let scopes = backend.scopes.read().await;
    let collections = backend.collections.read().await;
    let Some(items) = collections.get(&scope.resource_type) else {
        return Ok(Vec::new());
    };
    let by_resource: HashMap<&ResourceId, &OrderingRecord> = scopes
        .get(scope)
        .map(|s| s.records.values().map(|r| (&r.resource_id, r)).collect())
        .unwrap_or_default();
    let rows = items.values().map(|resource| {
        (
            by_resource.get(&resource.id).map(|r| (*r).clone()),
            resource.clone(),
        )
    });
    Ok(merge::merge_view(rows, query))
}
