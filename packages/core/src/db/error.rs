//! Store Error Types
//!
//! This module defines error types for index-store operations, separating
//! connectivity failures (fatal for a run) from per-index rejections.

use thiserror::Error;

/// Index store operation errors
///
/// `Connection` means the storage engine could not be reached at all. The
/// remaining variants describe a single rejected request and leave the
/// connection usable.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Storage engine is unreachable
    #[error("Failed to reach storage engine: {reason}")]
    Connection { reason: String },

    /// Named index does not exist on the collection
    #[error("Index '{name}' not found on collection '{collection}'")]
    NotFound { collection: String, name: String },

    /// Engine rejected a creation request
    #[error("Index '{name}' conflicts on collection '{collection}': {reason}")]
    Conflict {
        collection: String,
        name: String,
        reason: String,
    },

    /// Any other engine failure
    #[error("Index operation failed: {0}")]
    Operation(String),
}

impl StoreError {
    /// Create a connection error
    pub fn connection(reason: impl Into<String>) -> Self {
        Self::Connection {
            reason: reason.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(collection: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            name: name.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(
        collection: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            collection: collection.into(),
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a generic operation error
    pub fn operation(msg: impl Into<String>) -> Self {
        Self::Operation(msg.into())
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
