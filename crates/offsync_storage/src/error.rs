//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Another process owns the store directory.
    #[error("store is locked by another process: {0}")]
    Locked(String),

    /// The key contains characters outside `[A-Za-z0-9_-]` or is empty.
    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    /// A stored value is not valid UTF-8.
    #[error("store corrupted: {0}")]
    Corrupted(String),
}
