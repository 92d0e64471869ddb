//! Errors produced at the document-store boundary

use thiserror::Error;

/// Errors produced by a [`DocumentStore`](super::DocumentStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A `Create` write targeted a document that already exists.
    #[error("Document already exists: {0}")]
    Conflict(String),

    /// An `Update` write targeted a document that does not exist.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// The store could not apply the batch; nothing was written.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored document does not have the expected shape.
    #[error("Malformed document {path}: {reason}")]
    Decode {
        /// Path of the offending document
        path: String,
        /// Deserializer message
        reason: String,
    },

    /// Backend failure (SQLite, serialization of stored fields).
    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Convenience alias used at the store boundary.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
