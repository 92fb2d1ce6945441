//! In-memory backend implementation
//!
//! This module provides an in-memory implementation of the
//! [`OrderingBackend`] trait, suitable for testing, development, or hosts that
//! persist state by saving the whole backend to a file.

mod persistence;
mod storage;

use std::any::Any;
use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::Result;
use crate::backend::{OrderingBackend, ScopeSnapshot, WriteOp};
use crate::merge::MergeQuery;
use crate::projection::CollectionItem;
use crate::types::{OrderingRecord, RecordId, Resource, ResourceId, ResourceType, Scope};

/// Records and version counter of one scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct ScopeState {
    pub(crate) version: u64,
    pub(crate) records: HashMap<RecordId, OrderingRecord>,
}

/// Items of the external collections, grouped by resource type.
pub(crate) type Collections = HashMap<ResourceType, HashMap<ResourceId, Resource>>;

/// A simple in-memory backend using `HashMap`s for storage.
///
/// Writes to a scope hold the scope map's write lock for the whole
/// check-and-apply step, so concurrent writers serialize and readers only ever
/// observe committed, dense scopes.
///
/// State can be persisted with [`InMemory::save_to_file`] and restored with
/// [`InMemory::load_from_file`], serializing everything to JSON.
#[derive(Debug, Default)]
pub struct InMemory {
    /// Ordering records grouped by scope.
    pub(crate) scopes: RwLock<HashMap<Scope, ScopeState>>,
    /// External resource collections registered by the host.
    pub(crate) collections: RwLock<Collections>,
}

impl InMemory {
    /// Creates a new, empty `InMemory` backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of ordering records across all scopes.
    pub async fn record_count(&self) -> usize {
        let scopes = self.scopes.read().await;
        scopes.values().map(|s| s.records.len()).sum()
    }

    /// Saves the entire backend state to a JSON file.
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        persistence::save_to_file(self, path).await
    }

    /// Loads backend state from a JSON file.
    ///
    /// If the file does not exist, a new, empty `InMemory` backend is returned.
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        persistence::load_from_file(path).await
    }
}

#[async_trait]
impl OrderingBackend for InMemory {
    async fn find_by_key(
        &self,
        scope: &Scope,
        resource_id: &ResourceId,
    ) -> Result<Option<OrderingRecord>> {
        storage::find_by_key(self, scope, resource_id).await
    }

    async fn find_scope(&self, scope: &Scope) -> Result<ScopeSnapshot> {
        storage::find_scope(self, scope).await
    }

    async fn resource_exists(
        &self,
        resource_type: &ResourceType,
        resource_id: &ResourceId,
    ) -> Result<bool> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(resource_type)
            .is_some_and(|items| items.contains_key(resource_id)))
    }

    async fn apply(
        &self,
        scope: &Scope,
        expected_version: u64,
        writes: Vec<WriteOp>,
    ) -> Result<()> {
        storage::apply(self, scope, expected_version, writes).await
    }

    async fn join_resources(&self, scope: &Scope) -> Result<Vec<(OrderingRecord, Resource)>> {
        storage::join_resources(self, scope).await
    }

    async fn left_join_merge(
        &self,
        scope: &Scope,
        query: &MergeQuery,
    ) -> Result<Vec<CollectionItem>> {
        storage::left_join_merge(self, scope, query).await
    }

    async fn ensure_indexes(&self) -> Result<()> {
        // Uniqueness is enforced by `apply`; maps need no lookup indexes.
        tracing::debug!("In-memory backend needs no index provisioning");
        Ok(())
    }

    async fn put_resource(&self, resource_type: &ResourceType, resource: Resource) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(resource_type.clone())
            .or_default()
            .insert(resource.id.clone(), resource);
        Ok(())
    }

    async fn remove_resource(
        &self,
        resource_type: &ResourceType,
        resource_id: &ResourceId,
    ) -> Result<bool> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(resource_type)
            .is_some_and(|items| items.remove(resource_id).is_some()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
