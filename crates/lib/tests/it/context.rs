//! Test context for managing test setup.
//!
//! Provides a composable `TestContext` that explicitly shows what each test
//! needs: an engine over the selected backend, a scope, the resources of its
//! collection and an initial order.

use std::sync::Arc;

use sorteia::{FixedClock, OrderingEngine, Placement, ResourceId, Scope};

use crate::helpers::{order_of, seed_resources, test_engine};

/// Owner used by contexts unless a test picks its own.
pub const OWNER: &str = "ana";
/// Resource type used by contexts unless a test picks its own.
pub const RESOURCE_TYPE: &str = "tasks";

/// Use the builder methods to set up what the test needs:
/// - `TestContext::new().await` - engine and scope, empty collection
/// - `.with_resources(&[..])` - registers collection items
/// - `.with_order(&[..])` - orders those items, first id at position 0
pub struct TestContext {
    pub engine: OrderingEngine,
    pub clock: Arc<FixedClock>,
    pub scope: Scope,
}

impl TestContext {
    pub async fn new() -> Self {
        let (engine, clock) = test_engine().await;
        Self {
            engine,
            clock,
            scope: Scope::new(OWNER, RESOURCE_TYPE),
        }
    }

    /// Register collection items of the context's resource type.
    pub async fn with_resources(self, ids: &[&str]) -> Self {
        seed_resources(
            self.engine.backend().as_ref(),
            self.scope.resource_type.as_str(),
            ids,
        )
        .await;
        self
    }

    /// Append `ids` to the owner's ordering one by one.
    pub async fn with_order(self, ids: &[&str]) -> Self {
        for id in ids {
            self.engine
                .reorder_one(&self.scope, &ResourceId::from(*id), Placement::End)
                .await
                .expect("Failed to set up initial order");
        }
        self
    }

    /// A second scope over the same collection, owned by someone else.
    pub fn other_owner(&self, owner: &str) -> Scope {
        Scope::new(owner, self.scope.resource_type.clone())
    }

    pub async fn order(&self) -> Vec<String> {
        order_of(&self.engine, &self.scope).await
    }
}
