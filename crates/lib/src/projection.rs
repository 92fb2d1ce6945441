//! Result projection.
//!
//! Output shapes returned by the engine. Building them is pure and cannot
//! fail.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::types::{OrderingRecord, Owner, RecordId, Resource};

/// Result of a single-item reorder.
///
/// The variant is the only visible difference between ordering an item for
/// the first time and moving it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ReorderOneOutcome {
    Created {
        id: RecordId,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        owner: Owner,
    },
    Updated {
        id: RecordId,
        updated_at: DateTime<Utc>,
    },
}

impl ReorderOneOutcome {
    pub fn created(record: &OrderingRecord) -> Self {
        ReorderOneOutcome::Created {
            id: record.id,
            created_at: record.created_at,
            updated_at: record.updated_at,
            owner: record.owner.clone(),
        }
    }

    pub fn updated(id: RecordId, updated_at: DateTime<Utc>) -> Self {
        ReorderOneOutcome::Updated { id, updated_at }
    }

    pub fn id(&self) -> RecordId {
        match self {
            ReorderOneOutcome::Created { id, .. } | ReorderOneOutcome::Updated { id, .. } => *id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, ReorderOneOutcome::Created { .. })
    }
}

/// Counts reported by a batch reorder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkWriteSummary {
    /// Existing records the batch wrote to.
    pub matched: usize,
    /// Matched records whose position actually changed.
    pub modified: usize,
    /// Records created by the batch.
    pub upserted: usize,
}

/// An ordering record joined with its resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordWithResource {
    #[serde(flatten)]
    pub ordering: OrderingRecord,
    pub resource: Resource,
}

impl RecordWithResource {
    /// Decode the resource payload into a host type.
    pub fn payload_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.resource.payload)
    }
}

/// One entry of the merged collection view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionItem {
    /// `None` for resources the owner never ordered.
    pub ordering: Option<OrderingRecord>,
    pub resource: Resource,
}

impl CollectionItem {
    pub fn is_ordered(&self) -> bool {
        self.ordering.is_some()
    }

    pub fn position(&self) -> Option<usize> {
        self.ordering.as_ref().map(|o| o.position)
    }
}

/// Pair records with their resources, preserving record order.
pub fn with_resources(
    joined: impl IntoIterator<Item = (OrderingRecord, Resource)>,
) -> Vec<RecordWithResource> {
    joined
        .into_iter()
        .map(|(ordering, resource)| RecordWithResource { ordering, resource })
        .collect()
}
