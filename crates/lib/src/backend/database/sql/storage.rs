//! Ordering record and resource operations for SQL backends.

use chrono::{DateTime, Utc};

use crate::Result;
use crate::backend::errors::BackendError;
use crate::backend::{ScopeSnapshot, WriteOp};
use crate::merge::{self, MergeQuery};
use crate::projection::CollectionItem;
use crate::types::{OrderingRecord, RecordId, Resource, ResourceId, ResourceType, Scope};

use super::{SqlxBackend, SqlxResultExt};

/// Column order shared by every query that reads a full ordering record.
const RECORD_COLUMNS: &str = "id, owner, resource_type, resource_id, position, created_at, updated_at";

type RecordRow = (String, String, String, String, i64, i64, i64);

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn to_sql_position(position: usize) -> Result<i64> {
    i64::try_from(position).map_err(|_| {
        BackendError::StateInconsistency {
            reason: format!("position {position} does not fit a BIGINT column"),
        }
        .into()
    })
}

fn record_from_row(row: RecordRow) -> Result<OrderingRecord> {
    let (id, owner, resource_type, resource_id, position, created_at, updated_at) = row;
    let record_id = RecordId::parse(&id).ok_or_else(|| BackendError::StateInconsistency {
        reason: format!("stored record id {id} is not a UUID"),
    })?;
    let position = usize::try_from(position).map_err(|_| BackendError::StateInconsistency {
        reason: format!("record {id} has negative position {position}"),
    })?;
    Ok(OrderingRecord {
        id: record_id,
        created_at: from_millis(created_at),
        updated_at: from_millis(updated_at),
        owner: owner.into(),
        position,
        resource_type: resource_type.into(),
        resource_id: resource_id.into(),
    })
}

fn resource_from_row(resource_id: String, created_at: i64, payload: &str) -> Result<Resource> {
    let payload: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| BackendError::DeserializationFailed { source: e })?;
    Ok(Resource::new(resource_id, from_millis(created_at), payload))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

/// Get the record of `resource_id` in `scope`, if any.
pub async fn find_by_key(
    backend: &SqlxBackend,
    scope: &Scope,
    resource_id: &ResourceId,
) -> Result<Option<OrderingRecord>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM ordering_records
         WHERE owner = $1 AND resource_type = $2 AND resource_id = $3"
    );
    let row: Option<RecordRow> = sqlx::query_as(&sql)
        .bind(scope.owner.as_str())
        .bind(scope.resource_type.as_str())
        .bind(resource_id.as_str())
        .fetch_optional(backend.pool())
        .await
        .sql_context("Failed to get ordering record")?;

    row.map(record_from_row).transpose()
}

/// Read the version of `scope`, `0` if it was never written.
async fn scope_version<'e, E>(executor: E, scope: &Scope) -> Result<u64>
where
    E: sqlx::Executor<'e, Database = sqlx::Any>,
{
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT version FROM scope_versions WHERE owner = $1 AND resource_type = $2")
            .bind(scope.owner.as_str())
            .bind(scope.resource_type.as_str())
            .fetch_optional(executor)
            .await
            .sql_context("Failed to get scope version")?;

    Ok(row.map_or(0, |(version,)| u64::try_from(version).unwrap_or(0)))
}

/// All records of `scope` sorted by position, with the version they were read at.
pub async fn find_scope(backend: &SqlxBackend, scope: &Scope) -> Result<ScopeSnapshot> {
    // Version first: if a commit lands between the two reads, the snapshot's
    // version is stale and the caller's `apply` is rejected.
    let version = scope_version(backend.pool(), scope).await?;

    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM ordering_records
         WHERE owner = $1 AND resource_type = $2
         ORDER BY position"
    );
    let rows: Vec<RecordRow> = sqlx::query_as(&sql)
        .bind(scope.owner.as_str())
        .bind(scope.resource_type.as_str())
        .fetch_all(backend.pool())
        .await
        .sql_context("Failed to get scope records")?;

    let records = rows
        .into_iter()
        .map(record_from_row)
        .collect::<Result<Vec<_>>>()?;
    Ok(ScopeSnapshot { version, records })
}

pub async fn resource_exists(
    backend: &SqlxBackend,
    resource_type: &ResourceType,
    resource_id: &ResourceId,
) -> Result<bool> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM resources WHERE resource_type = $1 AND resource_id = $2",
    )
    .bind(resource_type.as_str())
    .bind(resource_id.as_str())
    .fetch_one(backend.pool())
    .await
    .sql_context("Failed to check resource existence")?;

    Ok(count > 0)
}

/// Apply `writes` to `scope` in one transaction guarded by the scope version.
///
/// Dropping the transaction on any early return rolls it back.
pub async fn apply(
    backend: &SqlxBackend,
    scope: &Scope,
    expected_version: u64,
    writes: Vec<WriteOp>,
) -> Result<()> {
    let expected = i64::try_from(expected_version).map_err(|_| BackendError::StateInconsistency {
        reason: format!("scope version {expected_version} does not fit a BIGINT column"),
    })?;

    let mut tx = backend
        .pool()
        .begin()
        .await
        .sql_context("Failed to begin transaction")?;

    sqlx::query(
        "INSERT INTO scope_versions (owner, resource_type, version) VALUES ($1, $2, 0)
         ON CONFLICT (owner, resource_type) DO NOTHING",
    )
    .bind(scope.owner.as_str())
    .bind(scope.resource_type.as_str())
    .execute(&mut *tx)
    .await
    .sql_context("Failed to register scope version")?;

    let bumped = sqlx::query(
        "UPDATE scope_versions SET version = version + 1
         WHERE owner = $1 AND resource_type = $2 AND version = $3",
    )
    .bind(scope.owner.as_str())
    .bind(scope.resource_type.as_str())
    .bind(expected)
    .execute(&mut *tx)
    .await
    .sql_context("Failed to bump scope version")?
    .rows_affected();

    if bumped != 1 {
        let actual = scope_version(&mut *tx, scope).await?;
        return Err(BackendError::ScopeVersionConflict {
            scope: scope.clone(),
            expected: expected_version,
            actual,
        }
        .into());
    }

    for write in writes {
        match write {
            WriteOp::Insert(record) => {
                if record.owner != scope.owner || record.resource_type != scope.resource_type {
                    return Err(BackendError::StateInconsistency {
                        reason: format!("record {} does not belong to scope {scope}", record.id),
                    }
                    .into());
                }
                let inserted = sqlx::query(
                    "INSERT INTO ordering_records
                        (id, owner, resource_type, resource_id, position, created_at, updated_at)
                     VALUES ($1, $2, $3, $4, $5, $6, $7)",
                )
                .bind(record.id.to_string())
                .bind(record.owner.as_str())
                .bind(record.resource_type.as_str())
                .bind(record.resource_id.as_str())
                .bind(to_sql_position(record.position)?)
                .bind(to_millis(record.created_at))
                .bind(to_millis(record.updated_at))
                .execute(&mut *tx)
                .await;

                match inserted {
                    Ok(_) => {}
                    Err(e) if is_unique_violation(&e) => {
                        return Err(BackendError::DuplicateOrderingKey {
                            scope: scope.clone(),
                            resource_id: record.resource_id,
                        }
                        .into());
                    }
                    Err(e) => return Err(e).sql_context("Failed to insert ordering record"),
                }
            }
            WriteOp::SetPosition {
                id,
                position,
                updated_at,
            } => {
                let updated = sqlx::query(
                    "UPDATE ordering_records SET position = $1, updated_at = $2
                     WHERE id = $3 AND owner = $4 AND resource_type = $5",
                )
                .bind(to_sql_position(position)?)
                .bind(to_millis(updated_at))
                .bind(id.to_string())
                .bind(scope.owner.as_str())
                .bind(scope.resource_type.as_str())
                .execute(&mut *tx)
                .await
                .sql_context("Failed to update record position")?
                .rows_affected();

                if updated == 0 {
                    return Err(BackendError::RecordNotFound { id }.into());
                }
            }
            WriteOp::Delete { id } => {
                let deleted = sqlx::query(
                    "DELETE FROM ordering_records
                     WHERE id = $1 AND owner = $2 AND resource_type = $3",
                )
                .bind(id.to_string())
                .bind(scope.owner.as_str())
                .bind(scope.resource_type.as_str())
                .execute(&mut *tx)
                .await
                .sql_context("Failed to delete ordering record")?
                .rows_affected();

                if deleted == 0 {
                    return Err(BackendError::RecordNotFound { id }.into());
                }
            }
        }
    }

    let (count, distinct, min, max): (i64, i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COUNT(DISTINCT position),
                COALESCE(MIN(position), 0), COALESCE(MAX(position), -1)
         FROM ordering_records WHERE owner = $1 AND resource_type = $2",
    )
    .bind(scope.owner.as_str())
    .bind(scope.resource_type.as_str())
    .fetch_one(&mut *tx)
    .await
    .sql_context("Failed to verify scope density")?;

    let dense = count == distinct && (count == 0 || (min == 0 && max == count - 1));
    if !dense {
        return Err(BackendError::StateInconsistency {
            reason: format!("write to scope {scope} would leave positions non-dense"),
        }
        .into());
    }

    tx.commit()
        .await
        .sql_context("Failed to commit transaction")?;
    Ok(())
}

/// Records of `scope` inner-joined with their resources, in position order.
pub async fn join_resources(
    backend: &SqlxBackend,
    scope: &Scope,
) -> Result<Vec<(OrderingRecord, Resource)>> {
    let rows: Vec<(String, String, String, String, i64, i64, i64, i64, String)> = sqlx::query_as(
        "SELECT o.id, o.owner, o.resource_type, o.resource_id, o.position,
                o.created_at, o.updated_at, r.created_at, r.payload
         FROM ordering_records o
         JOIN resources r
           ON r.resource_type = o.resource_type AND r.resource_id = o.resource_id
         WHERE o.owner = $1 AND o.resource_type = $2
         ORDER BY o.position",
    )
    .bind(scope.owner.as_str())
    .bind(scope.resource_type.as_str())
    .fetch_all(backend.pool())
    .await
    .sql_context("Failed to join records with resources")?;

    rows.into_iter()
        .map(
            |(id, owner, rtype, rid, position, created, updated, r_created, payload)| {
                let resource = resource_from_row(rid.clone(), r_created, &payload)?;
                let record = record_from_row((id, owner, rtype, rid, position, created, updated))?;
                Ok((record, resource))
            },
        )
        .collect()
}

/// Every resource of the scope's type, left-joined with the owner's records.
///
/// Filtering, ordering and paging run on the joined rows through
/// [`merge::merge_view`], since the filter matches inside JSON payloads.
pub async fn left_join_merge(
    backend: &SqlxBackend,
    scope: &Scope,
    query: &MergeQuery,
) -> Result<Vec<CollectionItem>> {
    type MergeRow = (
        String,
        i64,
        String,
        Option<String>,
        Option<i64>,
        Option<i64>,
        Option<i64>,
    );
    let rows: Vec<MergeRow> = sqlx::query_as(
        "SELECT r.resource_id, r.created_at, r.payload,
                o.id, o.position, o.created_at, o.updated_at
         FROM resources r
         LEFT JOIN ordering_records o
           ON o.resource_type = r.resource_type
          AND o.resource_id = r.resource_id
          AND o.owner = $1
         WHERE r.resource_type = $2",
    )
    .bind(scope.owner.as_str())
    .bind(scope.resource_type.as_str())
    .fetch_all(backend.pool())
    .await
    .sql_context("Failed to merge collection with records")?;

    let mut joined = Vec::with_capacity(rows.len());
    for (rid, r_created, payload, id, position, created, updated) in rows {
        let resource = resource_from_row(rid.clone(), r_created, &payload)?;
        let record = match (id, position, created, updated) {
            (Some(id), Some(position), Some(created), Some(updated)) => Some(record_from_row((
                id,
                scope.owner.to_string(),
                scope.resource_type.to_string(),
                rid,
                position,
                created,
                updated,
            ))?),
            _ => None,
        };
        joined.push((record, resource));
    }

    Ok(merge::merge_view(joined, query))
}

/// Insert or replace an item of an external collection.
pub async fn put_resource(
    backend: &SqlxBackend,
    resource_type: &ResourceType,
    resource: Resource,
) -> Result<()> {
    let payload = serde_json::to_string(&resource.payload)
        .map_err(|e| BackendError::SerializationFailed { source: e })?;

    sqlx::query(
        "INSERT INTO resources (resource_type, resource_id, created_at, payload)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (resource_type, resource_id) DO UPDATE SET
            created_at = excluded.created_at,
            payload = excluded.payload",
    )
    .bind(resource_type.as_str())
    .bind(resource.id.as_str())
    .bind(to_millis(resource.created_at))
    .bind(payload.as_str())
    .execute(backend.pool())
    .await
    .sql_context("Failed to store resource")?;

    Ok(())
}

pub async fn remove_resource(
    backend: &SqlxBackend,
    resource_type: &ResourceType,
    resource_id: &ResourceId,
) -> Result<bool> {
    let removed = sqlx::query("DELETE FROM resources WHERE resource_type = $1 AND resource_id = $2")
        .bind(resource_type.as_str())
        .bind(resource_id.as_str())
        .execute(backend.pool())
        .await
        .sql_context("Failed to remove resource")?
        .rows_affected();

    Ok(removed > 0)
}
