//! # Offsync Protocol
//!
//! Operation, conflict and wire types for the offsync engine.
//!
//! This crate provides:
//! - `QueuedOperation` for durable mutation records
//! - `SyncConflict` and resolution strategies
//! - The request body sent to the remote sync endpoint
//! - JSON encoding/decoding of persisted state
//!
//! This is a pure protocol crate with no I/O operations. Business payloads
//! are opaque JSON values; nothing here interprets them beyond the shallow
//! merge used as a fallback conflict strategy.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod conflict;
mod error;
mod messages;
mod operation;

pub use conflict::{shallow_merge, ConflictId, ResolutionStrategy, SyncConflict};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{ConflictBody, SyncRequest};
pub use operation::{OperationCounts, OperationId, OperationKind, OperationStatus, QueuedOperation};

/// Timestamp type used throughout the protocol.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
