//! Ordering engine error types.
//!
//! These are the four failure kinds callers are expected to handle. They are
//! surfaced verbatim; translating them into user-facing messages or status
//! codes is the caller's job.

use thiserror::Error;

use crate::backend::BackendError;
use crate::types::{ResourceId, ResourceType};

/// Errors raised by [`OrderingEngine`](super::OrderingEngine) operations.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum OrderingError {
    /// Requested position is outside the scope, or a batch cannot produce a
    /// dense assignment.
    #[error("Position out of bounds: {reason}")]
    PositionOutOfBounds {
        /// What made the position invalid
        reason: String,
    },

    /// The item to order does not exist in its external collection.
    #[error("Object to be sorted not found: {resource_id} in {resource_type}")]
    ObjectToBeSortedNotFound {
        resource_type: ResourceType,
        resource_id: ResourceId,
    },

    /// The atomic write was rejected, conflicted or timed out. Safe to retry.
    #[error("Custom order not saved: {reason}")]
    CustomOrderNotSaved {
        /// Why the commit did not happen
        reason: String,
        /// The backend failure, absent when the write timed out
        #[source]
        source: Option<BackendError>,
    },

    /// No ordering record exists for the resource in this scope.
    #[error("Custom order not found: {resource_id} in {resource_type}")]
    CustomOrderNotFound {
        resource_type: ResourceType,
        resource_id: ResourceId,
    },
}

impl OrderingError {
    /// Check if this error is a position validation failure.
    pub fn is_position_out_of_bounds(&self) -> bool {
        matches!(self, OrderingError::PositionOutOfBounds { .. })
    }

    /// Check if this error indicates something was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            OrderingError::ObjectToBeSortedNotFound { .. }
                | OrderingError::CustomOrderNotFound { .. }
        )
    }

    /// Check if this error is caused by the request itself.
    pub fn is_caller_error(&self) -> bool {
        !self.is_retryable()
    }

    /// Check if retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OrderingError::CustomOrderNotSaved { .. })
    }

    /// Check if the commit lost an optimistic-concurrency race against
    /// another writer of the same scope.
    pub fn is_conflict(&self) -> bool {
        match self {
            OrderingError::CustomOrderNotSaved {
                source: Some(source),
                ..
            } => source.is_conflict(),
            _ => false,
        }
    }

    /// Get the resource ID if this error is about a specific resource.
    pub fn resource_id(&self) -> Option<&ResourceId> {
        match self {
            OrderingError::ObjectToBeSortedNotFound { resource_id, .. }
            | OrderingError::CustomOrderNotFound { resource_id, .. } => Some(resource_id),
            _ => None,
        }
    }
}

impl From<OrderingError> for crate::Error {
    fn from(err: OrderingError) -> Self {
        crate::Error::Ordering(err)
    }
}
