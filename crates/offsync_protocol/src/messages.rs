//! Wire messages exchanged with the remote sync endpoint.

use crate::error::{ProtocolError, ProtocolResult};
use crate::operation::{OperationId, OperationKind, QueuedOperation};
use crate::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a `POST` to the sync endpoint.
///
/// ```json
/// { "operation": "Update", "resource": "case/123", "data": {...}, "timestamp": "..." }
/// ```
///
/// The idempotency key is not part of the body; transports send it as a
/// header so the server can discard replays of an already applied write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Mutation kind.
    pub operation: OperationKind,
    /// Target resource.
    pub resource: String,
    /// Opaque payload.
    pub data: Value,
    /// Original enqueue time of the operation.
    pub timestamp: Timestamp,
    /// Operation ID, used as the idempotency key.
    #[serde(skip)]
    pub idempotency_key: Option<OperationId>,
}

impl SyncRequest {
    /// Builds the request for a queued operation.
    pub fn from_operation(operation: &QueuedOperation) -> Self {
        Self {
            operation: operation.kind,
            resource: operation.resource.clone(),
            data: operation.payload.clone(),
            timestamp: operation.enqueued_at,
            idempotency_key: Some(operation.id),
        }
    }

    /// Encodes the request body as JSON bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes a request body.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Body of a `409 Conflict` response.
///
/// Only `data` is required; any other fields the server adds are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictBody {
    /// The server's current state of the entity.
    pub data: Value,
}

impl ConflictBody {
    /// Decodes a conflict body.
    ///
    /// Fails if the body is not JSON or has no `data` field.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        let map = value
            .as_object()
            .ok_or_else(|| ProtocolError::invalid_structure("expected object for conflict body"))?;
        let data = map
            .get("data")
            .cloned()
            .ok_or_else(|| ProtocolError::invalid_structure("missing data"))?;
        Ok(Self { data })
    }

    /// Encodes the body as JSON bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
