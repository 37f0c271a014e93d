use std::path::PathBuf;

use prov_types::Digest;

/// Errors from hash-log operations.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// I/O error from the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored log is not a JSON array of 32-byte hex digests.
    #[error("corrupt hash log at {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// A save would reorder, replace, or drop persisted entries.
    #[error("hash log is append-only: {reason}")]
    NotAppendOnly { reason: String },

    /// A save contained the same digest twice.
    #[error("duplicate digest in hash log: {0}")]
    Duplicate(Digest),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for hash-log operations.
pub type LogResult<T> = Result<T, LogError>;
