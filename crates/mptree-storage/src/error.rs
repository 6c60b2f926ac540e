//! Storage error types for mptree-storage.
//!
//! [`StorageError`] covers the failure modes of the storage layer: backend
//! errors, serialization of node payloads, and uniqueness or integrity
//! violations detected before a write is applied.

use thiserror::Error;

/// Errors produced by repository operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The SQLite backend reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// JSON serialization or deserialization of a payload failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A row with this path already exists.
    #[error("duplicate path: '{path}'")]
    DuplicatePath { path: String },

    /// A row with this id already exists.
    #[error("duplicate node id: {0}")]
    DuplicateId(i64),

    /// No row has this id.
    #[error("node not found: id={0}")]
    NodeNotFound(i64),

    /// A data integrity violation was detected.
    #[error("integrity error: {reason}")]
    IntegrityError { reason: String },
}
