//! Backend error types.
//!
//! Structured errors for storage operations. During a mutation the engine
//! folds all of these into `CustomOrderNotSaved`; reads surface them as
//! `Error::Backend`.

use thiserror::Error;

use crate::types::{RecordId, ResourceId, Scope};

/// Errors that can occur during backend operations.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Field additions/changes require a major version bump
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BackendError {
    /// The scope changed between the snapshot and the write.
    #[error("Scope {scope} changed concurrently: expected version {expected}, found {actual}")]
    ScopeVersionConflict {
        scope: Scope,
        expected: u64,
        actual: u64,
    },

    /// An insert would create a second record for the same resource.
    #[error("Ordering record already exists for {resource_id} in scope {scope}")]
    DuplicateOrderingKey {
        scope: Scope,
        resource_id: ResourceId,
    },

    /// A write referenced a record that is not in the scope.
    #[error("Ordering record not found: {id}")]
    RecordNotFound { id: RecordId },

    /// Serialization failed.
    #[error("Serialization failed")]
    SerializationFailed {
        #[source]
        source: serde_json::Error,
    },

    /// Deserialization failed.
    #[error("Deserialization failed")]
    DeserializationFailed {
        #[source]
        source: serde_json::Error,
    },

    /// File I/O error.
    #[error("File I/O error")]
    FileIo {
        #[source]
        source: std::io::Error,
    },

    /// Stored state violates an ordering invariant.
    #[error("Backend state inconsistency: {reason}")]
    StateInconsistency { reason: String },

    /// SQL database error.
    #[cfg(any(feature = "sqlite", feature = "postgres"))]
    #[error("SQL error: {reason}")]
    SqlxError {
        reason: String,
        #[source]
        source: Option<sqlx::Error>,
    },
}

impl BackendError {
    /// Check if this error indicates a lost optimistic-concurrency race.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            BackendError::ScopeVersionConflict { .. } | BackendError::DuplicateOrderingKey { .. }
        )
    }

    /// Check if this error indicates a resource was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::RecordNotFound { .. })
    }

    /// Check if this error is related to I/O or encoding.
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            BackendError::FileIo { .. }
                | BackendError::SerializationFailed { .. }
                | BackendError::DeserializationFailed { .. }
        )
    }

    /// Check if this error indicates corrupted or inconsistent stored data.
    pub fn is_integrity_error(&self) -> bool {
        matches!(self, BackendError::StateInconsistency { .. })
    }

    /// Get the scope if this error is about a specific scope.
    pub fn scope(&self) -> Option<&Scope> {
        match self {
            BackendError::ScopeVersionConflict { scope, .. }
            | BackendError::DuplicateOrderingKey { scope, .. } => Some(scope),
            _ => None,
        }
    }
}

impl From<BackendError> for crate::Error {
    fn from(err: BackendError) -> Self {
        crate::Error::Backend(err)
    }
}
