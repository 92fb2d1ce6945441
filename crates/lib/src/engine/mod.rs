//! The ordering engine: per-owner custom orderings over external collections.
//!
//! [`OrderingEngine`] owns every ordering invariant. Each mutation reads a
//! [`ScopeSnapshot`](crate::backend::ScopeSnapshot), computes the full set of
//! position changes with [`crate::position`], and hands them to the backend as
//! one version-checked [`apply`](crate::backend::OrderingBackend::apply). A
//! concurrent writer that committed first makes that apply fail, which is
//! reported as [`OrderingError::CustomOrderNotSaved`]; the engine never
//! retries on its own.

use std::sync::Arc;
use std::time::Duration;

use crate::{
    Clock, Error, Result, SystemClock,
    backend::{OrderingBackend, WriteOp},
    merge::MergeQuery,
    position,
    projection::{self, BulkWriteSummary, CollectionItem, RecordWithResource, ReorderOneOutcome},
    types::{OrderingRecord, Placement, ResourceId, Scope},
};

pub mod errors;

pub use errors::OrderingError;

/// Default bound on a single atomic write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables for [`OrderingEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on one backend `apply`. Expiry aborts the write and
    /// surfaces as [`OrderingError::CustomOrderNotSaved`].
    pub write_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl EngineConfig {
    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }
}

struct EngineInner {
    backend: Arc<dyn OrderingBackend>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl std::fmt::Debug for EngineInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineInner")
            .field("backend", &"<OrderingBackend>")
            .field("clock", &self.clock)
            .field("config", &self.config)
            .finish()
    }
}

/// Entry point for every ordering operation.
///
/// `OrderingEngine` is a cheap-to-clone handle; clones share the backend.
/// The engine itself keeps no per-call state, so any number of tasks may
/// call it concurrently.
///
/// # Example
///
/// ```
/// # use sorteia::{OrderingEngine, Placement, Resource, Scope, backend::{OrderingBackend, database::InMemory}};
/// # #[tokio::main]
/// # async fn main() -> sorteia::Result<()> {
/// let backend = InMemory::new();
/// backend
///     .put_resource(&"tasks".into(), Resource::new("t1", chrono::Utc::now(), serde_json::json!({})))
///     .await?;
///
/// let engine = OrderingEngine::new(Box::new(backend));
/// let scope = Scope::new("ana", "tasks");
/// let outcome = engine.reorder_one(&scope, &"t1".into(), Placement::End).await?;
/// assert!(outcome.is_created());
/// assert_eq!(engine.read_many(&scope).await?[0].position, 0);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct OrderingEngine {
    inner: Arc<EngineInner>,
}

impl OrderingEngine {
    /// Create an engine over `backend` using the system clock and default config.
    pub fn new(backend: Box<dyn OrderingBackend>) -> Self {
        Self::from_parts(Arc::from(backend), Arc::new(SystemClock), EngineConfig::default())
    }

    /// Create an engine with explicit configuration.
    pub fn with_config(backend: Box<dyn OrderingBackend>, config: EngineConfig) -> Self {
        Self::from_parts(Arc::from(backend), Arc::new(SystemClock), config)
    }

    /// Create an engine with a custom clock (for controllable timestamps in tests).
    #[cfg(any(test, feature = "testing"))]
    pub fn with_clock(
        backend: Box<dyn OrderingBackend>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self::from_parts(Arc::from(backend), clock, config)
    }

    fn from_parts(
        backend: Arc<dyn OrderingBackend>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                backend,
                clock,
                config,
            }),
        }
    }

    /// The storage backend.
    pub fn backend(&self) -> &Arc<dyn OrderingBackend> {
        &self.inner.backend
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Insert `resource_id` into the owner's ordering, or move it there.
    ///
    /// `Placement::At(p)` accepts `p` up to the current record count. For a
    /// resource that is already ordered, `p == count` means the last slot.
    ///
    /// # Errors
    ///
    /// - [`OrderingError::PositionOutOfBounds`] if `p` exceeds the count
    /// - [`OrderingError::ObjectToBeSortedNotFound`] if a new resource does
    ///   not exist in its collection
    /// - [`OrderingError::CustomOrderNotSaved`] if the commit failed
    pub async fn reorder_one(
        &self,
        scope: &Scope,
        resource_id: &ResourceId,
        placement: Placement,
    ) -> Result<ReorderOneOutcome> {
        let backend = &self.inner.backend;
        let snapshot = backend.find_scope(scope).await?;
        let plan = position::insert_or_move(&snapshot.records, placement, resource_id)?;

        if plan.is_insert()
            && !backend
                .resource_exists(&scope.resource_type, resource_id)
                .await?
        {
            return Err(OrderingError::ObjectToBeSortedNotFound {
                resource_type: scope.resource_type.clone(),
                resource_id: resource_id.clone(),
            }
            .into());
        }

        tracing::debug!(
            owner = %scope.owner,
            resource_type = %scope.resource_type,
            resource_id = %resource_id,
            %placement,
            target = plan.target,
            shifted = plan.shifts.len(),
            "Planned reorder"
        );

        let now = self.inner.clock.now();
        let mut writes: Vec<WriteOp> = plan
            .shifts
            .iter()
            .map(|shift| WriteOp::SetPosition {
                id: shift.id,
                position: shift.to,
                updated_at: now,
            })
            .collect();

        let outcome = match plan.existing {
            Some((id, _)) => {
                writes.push(WriteOp::SetPosition {
                    id,
                    position: plan.target,
                    updated_at: now,
                });
                ReorderOneOutcome::updated(id, now)
            }
            None => {
                let record = OrderingRecord::new(scope, resource_id.clone(), plan.target, now);
                let outcome = ReorderOneOutcome::created(&record);
                writes.push(WriteOp::Insert(record));
                outcome
            }
        };

        self.commit(scope, snapshot.version, writes).await?;
        tracing::info!(
            owner = %scope.owner,
            resource_type = %scope.resource_type,
            resource_id = %resource_id,
            position = plan.target,
            created = outcome.is_created(),
            "Reordered item"
        );
        Ok(outcome)
    }

    /// Place a batch of resources at explicit positions in one atomic write.
    ///
    /// Every requested resource lands exactly on its position. Records not
    /// named in the batch keep their relative order and fill the remaining
    /// slots. An empty batch writes nothing.
    ///
    /// # Errors
    ///
    /// - [`OrderingError::PositionOutOfBounds`] on duplicate resources,
    ///   duplicate positions, or a position past the final record count
    /// - [`OrderingError::ObjectToBeSortedNotFound`] if a new resource does
    ///   not exist in its collection
    /// - [`OrderingError::CustomOrderNotSaved`] if the commit failed
    pub async fn reorder_many(
        &self,
        scope: &Scope,
        items: &[(ResourceId, usize)],
    ) -> Result<BulkWriteSummary> {
        if items.is_empty() {
            return Ok(BulkWriteSummary::default());
        }

        let backend = &self.inner.backend;
        let snapshot = backend.find_scope(scope).await?;
        let assignments = position::resolve_batch(&snapshot.records, items)?;
        if !position::is_dense(assignments.iter().map(|a| a.position)) {
            return Err(OrderingError::PositionOutOfBounds {
                reason: format!("batch does not produce a dense ordering for {scope}"),
            }
            .into());
        }

        for assignment in assignments.iter().filter(|a| a.previous.is_none()) {
            if !backend
                .resource_exists(&scope.resource_type, &assignment.resource_id)
                .await?
            {
                return Err(OrderingError::ObjectToBeSortedNotFound {
                    resource_type: scope.resource_type.clone(),
                    resource_id: assignment.resource_id.clone(),
                }
                .into());
            }
        }

        let now = self.inner.clock.now();
        let mut summary = BulkWriteSummary::default();
        let mut writes = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            match assignment.previous {
                None => {
                    summary.upserted += 1;
                    writes.push(WriteOp::Insert(OrderingRecord::new(
                        scope,
                        assignment.resource_id,
                        assignment.position,
                        now,
                    )));
                }
                Some((id, old)) => {
                    let moved = old != assignment.position;
                    if !moved && !assignment.requested {
                        continue;
                    }
                    summary.matched += 1;
                    if moved {
                        summary.modified += 1;
                    }
                    writes.push(WriteOp::SetPosition {
                        id,
                        position: assignment.position,
                        updated_at: now,
                    });
                }
            }
        }

        tracing::debug!(
            owner = %scope.owner,
            resource_type = %scope.resource_type,
            requested = items.len(),
            writes = writes.len(),
            "Planned batch reorder"
        );

        self.commit(scope, snapshot.version, writes).await?;
        tracing::info!(
            owner = %scope.owner,
            resource_type = %scope.resource_type,
            matched = summary.matched,
            modified = summary.modified,
            upserted = summary.upserted,
            "Reordered batch"
        );
        Ok(summary)
    }

    /// Every record of the scope, by position.
    pub async fn read_many(&self, scope: &Scope) -> Result<Vec<OrderingRecord>> {
        Ok(self.inner.backend.find_scope(scope).await?.records)
    }

    /// Every record of the scope paired with its resource, by position.
    ///
    /// Records whose resource has left the collection are skipped.
    pub async fn read_many_whole_object(&self, scope: &Scope) -> Result<Vec<RecordWithResource>> {
        let joined = self.inner.backend.join_resources(scope).await?;
        Ok(projection::with_resources(joined))
    }

    /// The whole collection of the scope's resource type in the owner's order.
    ///
    /// Ordered items come first by position, then unordered items by
    /// `created_at` descending. The filter applies before `offset`/`limit`.
    pub async fn read_many_entire_collection(
        &self,
        scope: &Scope,
        query: &MergeQuery,
    ) -> Result<Vec<CollectionItem>> {
        self.inner.backend.left_join_merge(scope, query).await
    }

    /// Remove `resource_id` from the owner's ordering and close the gap.
    ///
    /// Returns the removed record.
    ///
    /// # Errors
    ///
    /// - [`OrderingError::CustomOrderNotFound`] if the resource is not ordered
    /// - [`OrderingError::CustomOrderNotSaved`] if the commit failed
    pub async fn delete_one(
        &self,
        scope: &Scope,
        resource_id: &ResourceId,
    ) -> Result<OrderingRecord> {
        let snapshot = self.inner.backend.find_scope(scope).await?;
        let Some(record) = snapshot.find(resource_id).cloned() else {
            return Err(OrderingError::CustomOrderNotFound {
                resource_type: scope.resource_type.clone(),
                resource_id: resource_id.clone(),
            }
            .into());
        };

        let now = self.inner.clock.now();
        let mut writes = vec![WriteOp::Delete { id: record.id }];
        writes.extend(
            position::remove_and_compact(&snapshot.records, record.position)
                .into_iter()
                .map(|shift| WriteOp::SetPosition {
                    id: shift.id,
                    position: shift.to,
                    updated_at: now,
                }),
        );

        self.commit(scope, snapshot.version, writes).await?;
        tracing::info!(
            owner = %scope.owner,
            resource_type = %scope.resource_type,
            resource_id = %resource_id,
            position = record.position,
            "Deleted ordering record"
        );
        Ok(record)
    }

    /// Provision the backend's uniqueness and lookup indexes.
    pub async fn create_indexes(&self) -> Result<()> {
        self.inner.backend.ensure_indexes().await?;
        tracing::info!("Ordering indexes ready");
        Ok(())
    }

    /// Apply `writes` within the configured timeout.
    ///
    /// Every failure, including a lost version race, becomes
    /// `CustomOrderNotSaved`.
    async fn commit(
        &self,
        scope: &Scope,
        expected_version: u64,
        writes: Vec<WriteOp>,
    ) -> Result<()> {
        let timeout = self.inner.config.write_timeout;
        let apply = self.inner.backend.apply(scope, expected_version, writes);
        match tokio::time::timeout(timeout, apply).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                tracing::warn!(
                    owner = %scope.owner,
                    resource_type = %scope.resource_type,
                    expected_version,
                    error = %err,
                    "Ordering write rejected"
                );
                let reason = err.to_string();
                let source = match err {
                    Error::Backend(backend_err) => Some(backend_err),
                    _ => None,
                };
                Err(OrderingError::CustomOrderNotSaved { reason, source }.into())
            }
            Err(_) => {
                tracing::warn!(
                    owner = %scope.owner,
                    resource_type = %scope.resource_type,
                    timeout_ms = timeout.as_millis() as u64,
                    "Ordering write timed out"
                );
                Err(OrderingError::CustomOrderNotSaved {
                    reason: format!("write did not complete within {timeout:?}"),
                    source: None,
                }
                .into())
            }
        }
    }
}
