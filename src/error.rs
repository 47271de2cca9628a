//! Error types for Cirrus.

use thiserror::Error;

/// Common error type for Cirrus.
///
/// Every failure the engine can report is a distinct variant so the boundary
/// layer can map each kind to its own response semantics.
#[derive(Error, Debug)]
pub enum CirrusError {
    /// Database error.
    ///
    /// This is a generic database error that wraps errors from the metadata
    /// store. Database errors from sqlx are automatically converted.
    #[error("database error: {0}")]
    Database(String),

    /// Underlying storage I/O failure (write/read/delete).
    ///
    /// May be transient (disk pressure, permission races); callers may retry.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Invalid input (empty upload, unsafe filename).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Destination resolved outside the owner directory.
    #[error("path escapes owner directory: {0}")]
    PathEscape(String),

    /// Resource not found (owner-scoped, except share-token resolution).
    #[error("{0} not found")]
    NotFound(String),

    /// A sibling folder with the same name already exists.
    #[error("duplicate name: {0}")]
    DuplicateName(String),

    /// Folder move would create a cycle in the tree.
    #[error("cycle detected: {0}")]
    CycleDetected(String),

    /// Upload would exceed the owner's storage ceiling.
    ///
    /// Expected and recoverable; not transient, so retrying without freeing
    /// space is pointless.
    #[error("storage quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

// Conversion from sqlx errors
impl From<sqlx::Error> for CirrusError {
    fn from(e: sqlx::Error) -> Self {
        CirrusError::Database(e.to_string())
    }
}

/// Result type alias for Cirrus operations.
pub type Result<T> = std::result::Result<T, CirrusError>;
