//! Error types for the log store.

use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Invalid log format: {0}")]
    InvalidFormat(String),

    #[error("Store is locked by another process")]
    Locked,

    #[error("Store is closed")]
    Closed,

    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: Box<StoreError>,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Invalid filter field: {0}")]
    InvalidFilterField(String),
}

impl StoreError {
    /// Whether retrying the failed operation may succeed.
    ///
    /// Only I/O errors are retried. A closed or locked store stays that way,
    /// and a damaged frame reads back the same on every attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Io(_) => true,
            StoreError::Corruption(_)
            | StoreError::ChecksumMismatch { .. }
            | StoreError::InvalidFormat(_)
            | StoreError::Locked
            | StoreError::Closed
            | StoreError::RetriesExhausted { .. }
            | StoreError::Serialization(_)
            | StoreError::Encoding(_)
            | StoreError::MethodNotAllowed(_)
            | StoreError::MalformedRequest(_)
            | StoreError::InvalidFilterField(_) => false,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
