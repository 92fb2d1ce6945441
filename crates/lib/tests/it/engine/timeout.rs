//! Commit failures reported by the backend, including slow writes cut off by
//! the engine's write timeout and writers that lose a version race.

use std::any::Any;
use std::time::Duration;

use async_trait::async_trait;

use sorteia::{
    CollectionItem, EngineConfig, MergeQuery, OrderingEngine, OrderingError, OrderingRecord,
    Placement, Resource, ResourceId, ResourceType, Result, Scope, clock::millis_to_datetime,
    backend::{BackendError, OrderingBackend, ScopeSnapshot, WriteOp, database::InMemory},
};

use crate::helpers::seed_resources;

/// Delegates to [`InMemory`] but delays, rejects or races every `apply`.
struct FlakyBackend {
    inner: InMemory,
    apply_delay: Option<Duration>,
    reject: bool,
    /// Commit a competing insert of `B` just before each apply.
    race: bool,
}

#[async_trait]
impl OrderingBackend for FlakyBackend {
    async fn find_by_key(
        &self,
        scope: &Scope,
        resource_id: &ResourceId,
    ) -> Result<Option<OrderingRecord>> {
        self.inner.find_by_key(scope, resource_id).await
    }

    async fn find_scope(&self, scope: &Scope) -> Result<ScopeSnapshot> {
        self.inner.find_scope(scope).await
    }

    async fn resource_exists(
        &self,
        resource_type: &ResourceType,
        resource_id: &ResourceId,
    ) -> Result<bool> {
        self.inner.resource_exists(resource_type, resource_id).await
    }

    async fn apply(
        &self,
        scope: &Scope,
        expected_version: u64,
        writes: Vec<WriteOp>,
    ) -> Result<()> {
        if let Some(delay) = self.apply_delay {
            tokio::time::sleep(delay).await;
        }
        if self.reject {
            return Err(BackendError::StateInconsistency {
                reason: "storage unavailable".to_string(),
            }
            .into());
        }
        if self.race {
            let competitor =
                OrderingRecord::new(scope, ResourceId::from("B"), 0, millis_to_datetime(1));
            self.inner
                .apply(scope, expected_version, vec![WriteOp::Insert(competitor)])
                .await?;
        }
        self.inner.apply(scope, expected_version, writes).await
    }

    async fn join_resources(&self, scope: &Scope) -> Result<Vec<(OrderingRecord, Resource)>> {
        self.inner.join_resources(scope).await
    }

    async fn left_join_merge(
        &self,
        scope: &Scope,
        query: &MergeQuery,
    ) -> Result<Vec<CollectionItem>> {
        self.inner.left_join_merge(scope, query).await
    }

    async fn ensure_indexes(&self) -> Result<()> {
        self.inner.ensure_indexes().await
    }

    async fn put_resource(&self, resource_type: &ResourceType, resource: Resource) -> Result<()> {
        self.inner.put_resource(resource_type, resource).await
    }

    async fn remove_resource(
        &self,
        resource_type: &ResourceType,
        resource_id: &ResourceId,
    ) -> Result<bool> {
        self.inner.remove_resource(resource_type, resource_id).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

async fn flaky_engine(apply_delay: Option<Duration>, reject: bool) -> OrderingEngine {
    racing_engine(apply_delay, reject, false).await
}

async fn racing_engine(
    apply_delay: Option<Duration>,
    reject: bool,
    race: bool,
) -> OrderingEngine {
    let backend = FlakyBackend {
        inner: InMemory::new(),
        apply_delay,
        reject,
        race,
    };
    seed_resources(&backend, "tasks", &["A", "B"]).await;
    let config = EngineConfig::default().with_write_timeout(Duration::from_millis(50));
    OrderingEngine::with_config(Box::new(backend), config)
}

#[tokio::test]
async fn slow_write_is_abandoned_as_not_saved() {
    let engine = flaky_engine(Some(Duration::from_secs(2)), false).await;
    let scope = Scope::new("ana", "tasks");

    let err = engine
        .reorder_one(&scope, &"A".into(), Placement::End)
        .await
        .unwrap_err();

    assert!(matches!(
        err.as_ordering(),
        Some(OrderingError::CustomOrderNotSaved { source: None, .. })
    ));
    assert!(!err.is_conflict());
    assert!(engine.read_many(&scope).await.unwrap().is_empty());
}

#[tokio::test]
async fn backend_failure_is_reported_as_not_saved() {
    let engine = flaky_engine(None, true).await;
    let scope = Scope::new("ana", "tasks");

    let err = engine
        .reorder_many(&scope, &[(ResourceId::from("A"), 0)])
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert!(!err.is_conflict());
    assert!(err.to_string().contains("storage unavailable"));
    assert!(matches!(
        err.as_ordering(),
        Some(OrderingError::CustomOrderNotSaved {
            source: Some(BackendError::StateInconsistency { .. }),
            ..
        })
    ));
    assert!(engine.read_many(&scope).await.unwrap().is_empty());
}

#[tokio::test]
async fn fast_write_within_the_timeout_commits() {
    let engine = flaky_engine(Some(Duration::from_millis(1)), false).await;
    let scope = Scope::new("ana", "tasks");

    engine
        .reorder_one(&scope, &"A".into(), Placement::End)
        .await
        .unwrap();
    assert_eq!(engine.read_many(&scope).await.unwrap().len(), 1);
}

#[tokio::test]
async fn lost_version_race_is_reported_as_a_conflict() {
    let engine = racing_engine(None, false, true).await;
    let scope = Scope::new("ana", "tasks");

    let err = engine
        .reorder_one(&scope, &"A".into(), Placement::End)
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert!(err.is_conflict());
    let Some(OrderingError::CustomOrderNotSaved {
        source: Some(source),
        ..
    }) = err.as_ordering()
    else {
        panic!("expected an unsaved write with a backend source, got {err:?}");
    };
    assert!(matches!(source, BackendError::ScopeVersionConflict { .. }));

    // Only the competing writer's record made it in.
    let order: Vec<String> = engine
        .read_many(&scope)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.resource_id.to_string())
        .collect();
    assert_eq!(order, ["B"]);
}
