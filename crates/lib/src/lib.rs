//! Sorteia: per-owner custom orderings over external resource collections.
//!
//! Many owners can each impose their own linear order on the same items
//! without touching the items themselves. An ordering lives beside the
//! collection as a set of [`OrderingRecord`]s, one per ordered item, whose
//! positions are kept dense (`0..k`) within each [`Scope`].
//!
//! ## Core Concepts
//!
//! * **Scope (`types::Scope`)**: an `(owner, resource type)` pair. Positions are dense and unique per scope, and scopes never contend with each other.
//! * **Engine (`engine::OrderingEngine`)**: validates requests, plans position shifts and commits them atomically.
//! * **Position arithmetic (`position`)**: pure functions computing the shifts for an insert, move, removal or batch.
//! * **Backends (`backend::OrderingBackend`)**: pluggable storage for records and the external collections. `InMemory` and the sqlx-based SQLite/PostgreSQL backends ship with the crate.
//! * **Merge view (`merge`)**: the "ordered items first, then everything else" listing of a whole collection.
//!
//! ## Example
//!
//! ```
//! # use sorteia::{OrderingEngine, Placement, Resource, Scope, backend::{OrderingBackend, database::InMemory}};
//! # #[tokio::main]
//! # async fn main() -> sorteia::Result<()> {
//! let backend = InMemory::new();
//! for id in ["a", "b", "c"] {
//!     backend
//!         .put_resource(&"tasks".into(), Resource::new(id, chrono::Utc::now(), serde_json::json!({})))
//!         .await?;
//! }
//! let engine = OrderingEngine::new(Box::new(backend));
//! let scope = Scope::new("ana", "tasks");
//!
//! engine.reorder_one(&scope, &"a".into(), Placement::End).await?;
//! engine.reorder_one(&scope, &"b".into(), Placement::At(0)).await?;
//!
//! let order: Vec<String> = engine
//!     .read_many(&scope)
//!     .await?
//!     .into_iter()
//!     .map(|r| r.resource_id.to_string())
//!     .collect();
//! assert_eq!(order, ["b", "a"]);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod clock;
pub mod engine;
pub mod merge;
pub mod position;
pub mod projection;
pub mod types;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "testing"))]
pub use clock::FixedClock;
pub use engine::{EngineConfig, OrderingEngine, OrderingError};
pub use merge::{MergeQuery, ResourceFilter};
pub use projection::{BulkWriteSummary, CollectionItem, RecordWithResource, ReorderOneOutcome};
pub use types::{
    OrderingRecord, Owner, Placement, RecordId, Resource, ResourceId, ResourceType, Scope,
};

/// Result type used throughout the Sorteia library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Sorteia library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured ordering errors from the engine module
    #[error(transparent)]
    Ordering(engine::OrderingError),

    /// Structured storage errors from the backend module
    #[error(transparent)]
    Backend(backend::BackendError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Ordering(_) => "engine",
            Error::Backend(_) => "backend",
            Error::Io(_) => "io",
            Error::Serialize(_) => "serialize",
        }
    }

    /// Check if this error indicates a resource or record was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Ordering(ordering_err) => ordering_err.is_not_found(),
            Error::Backend(backend_err) => backend_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error indicates a lost concurrency race, either raw from
    /// a backend or reported by the engine as an unsaved write.
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Ordering(ordering_err) => ordering_err.is_conflict(),
            Error::Backend(backend_err) => backend_err.is_conflict(),
            _ => false,
        }
    }

    /// Check if this error was caused by an invalid position or batch.
    pub fn is_position_out_of_bounds(&self) -> bool {
        match self {
            Error::Ordering(ordering_err) => ordering_err.is_position_out_of_bounds(),
            _ => false,
        }
    }

    /// Check if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Ordering(ordering_err) => ordering_err.is_retryable(),
            Error::Backend(backend_err) => backend_err.is_conflict(),
            _ => false,
        }
    }

    /// Check if this error is storage-related.
    pub fn is_database_error(&self) -> bool {
        matches!(self, Error::Backend(_))
    }

    /// Check if this error indicates a data integrity issue.
    pub fn is_integrity_error(&self) -> bool {
        match self {
            Error::Backend(backend_err) => backend_err.is_integrity_error(),
            _ => false,
        }
    }

    /// Check if this error is I/O related.
    pub fn is_io_error(&self) -> bool {
        match self {
            Error::Io(_) => true,
            Error::Backend(backend_err) => backend_err.is_io_error(),
            _ => false,
        }
    }

    /// The engine error, if this is one.
    pub fn as_ordering(&self) -> Option<&OrderingError> {
        match self {
            Error::Ordering(ordering_err) => Some(ordering_err),
            _ => None,
        }
    }
}
