//! Error types for the sync engine.

use offsync_protocol::{ConflictId, ProtocolError};
use offsync_storage::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The server answered with something the engine cannot interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Server rejected the request with a non-conflict status.
    #[error("server rejected request with status {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// Durable store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// JSON encoding or decoding error.
    #[error("codec error: {0}")]
    Codec(String),

    /// No conflict with the given ID exists.
    #[error("conflict not found: {0}")]
    ConflictNotFound(ConflictId),

    /// Not connected.
    #[error("not connected to server")]
    NotConnected,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Rejected { .. } => true,
            SyncError::NotConnected => true,
            _ => false,
        }
    }

    /// Returns true if this error aborts a whole drain pass rather than a
    /// single delivery.
    pub fn is_pass_fault(&self) -> bool {
        matches!(self, SyncError::Protocol(_) | SyncError::Codec(_))
    }
}

impl From<ProtocolError> for SyncError {
    fn from(e: ProtocolError) -> Self {
        SyncError::Codec(e.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Codec(e.to_string())
    }
}
