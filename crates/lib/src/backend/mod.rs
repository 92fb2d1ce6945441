//! Storage backends for ordering records.
//!
//! This module provides the [`OrderingBackend`] trait and its implementations
//! under [`database`]. The trait is the only way the engine touches storage,
//! which keeps the ordering rules independent of where records and the
//! external resource collections actually live.
//!
//! ## Concurrency contract
//!
//! Every scope carries a version counter. [`OrderingBackend::find_scope`]
//! returns the records together with the version they were read at, and
//! [`OrderingBackend::apply`] commits a batch of writes only if the version is
//! still the same, bumping it in the same atomic step. Two writers racing on a
//! scope therefore cannot both commit from the same snapshot; the loser gets
//! [`BackendError::ScopeVersionConflict`] and nothing it wrote is visible.

use std::any::Any;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::merge::MergeQuery;
use crate::projection::CollectionItem;
use crate::types::{OrderingRecord, RecordId, Resource, ResourceId, ResourceType, Scope};

pub mod database;
pub mod errors;

pub use errors::BackendError;

/// Records of one scope as of a specific version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSnapshot {
    /// Scope version the records were read at. `0` for a scope never written.
    pub version: u64,
    /// Records sorted by position ascending.
    pub records: Vec<OrderingRecord>,
}

impl ScopeSnapshot {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, resource_id: &ResourceId) -> Option<&OrderingRecord> {
        self.records.iter().find(|r| &r.resource_id == resource_id)
    }
}

/// One write inside an atomic [`OrderingBackend::apply`] batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOp {
    /// Create a new record. Fails if the scope already orders the resource.
    Insert(OrderingRecord),
    /// Move an existing record and refresh its `updated_at`.
    SetPosition {
        id: RecordId,
        position: usize,
        updated_at: DateTime<Utc>,
    },
    /// Remove an existing record.
    Delete { id: RecordId },
}

/// Backend trait abstracting the storage of ordering records and the lookup
/// of the external resource collections they point into.
///
/// All implementations must be `Send` and `Sync` to allow sharing across
/// tasks, and implement `Any` to allow downcasting (e.g. to persist an
/// [`database::InMemory`] backend on shutdown).
#[async_trait]
pub trait OrderingBackend: Send + Sync + Any {
    /// Record for `resource_id` in `scope`, if the owner ordered it.
    async fn find_by_key(
        &self,
        scope: &Scope,
        resource_id: &ResourceId,
    ) -> Result<Option<OrderingRecord>>;

    /// Every record of `scope`, sorted by position, with the scope version.
    async fn find_scope(&self, scope: &Scope) -> Result<ScopeSnapshot>;

    /// Whether `resource_id` currently exists in the `resource_type` collection.
    async fn resource_exists(
        &self,
        resource_type: &ResourceType,
        resource_id: &ResourceId,
    ) -> Result<bool>;

    /// Apply `writes` to `scope` atomically if its version is still
    /// `expected_version`.
    ///
    /// On success the scope version is incremented exactly once. On any error
    /// none of the writes are visible.
    async fn apply(&self, scope: &Scope, expected_version: u64, writes: Vec<WriteOp>)
    -> Result<()>;

    /// Records of `scope` paired with their resources, in position order.
    ///
    /// Records whose resource no longer exists are omitted.
    async fn join_resources(&self, scope: &Scope) -> Result<Vec<(OrderingRecord, Resource)>>;

    /// The merged view of `scope`'s resource type: every resource matching the
    /// query filter, left-joined with the owner's records, ordered and paged
    /// as described in [`crate::merge`].
    async fn left_join_merge(&self, scope: &Scope, query: &MergeQuery)
    -> Result<Vec<CollectionItem>>;

    /// Provision uniqueness and lookup indexes. Idempotent.
    async fn ensure_indexes(&self) -> Result<()>;

    /// Register or replace an item of an external collection.
    ///
    /// Host-side API; the engine never calls it.
    async fn put_resource(&self, resource_type: &ResourceType, resource: Resource) -> Result<()>;

    /// Remove an item from an external collection.
    ///
    /// Records pointing at it are kept; reads that join resources skip them.
    async fn remove_resource(
        &self,
        resource_type: &ResourceType,
        resource_id: &ResourceId,
    ) -> Result<bool>;

    /// Returns a reference to the backend as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}
