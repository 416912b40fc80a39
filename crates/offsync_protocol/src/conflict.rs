//! Conflict records and resolution strategies.

use crate::error::ProtocolResult;
use crate::operation::QueuedOperation;
use crate::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a conflict.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictId(Uuid);

impl ConflictId {
    /// Creates a new random conflict ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a conflict ID from its hyphenated string form.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for ConflictId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConflictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConflictId({})", self.0)
    }
}

impl fmt::Display for ConflictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A server-reported mismatch between a client write and the server state.
///
/// The operation that produced the conflict is parked here and is no longer
/// in the queue until the conflict is resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConflict {
    /// Unique conflict ID.
    pub id: ConflictId,
    /// The operation whose delivery triggered the conflict.
    pub operation: QueuedOperation,
    /// The state the server reports as current.
    pub server_data: Value,
    /// The payload the client attempted to write.
    pub client_data: Value,
    /// Detection time.
    pub detected_at: Timestamp,
}

impl SyncConflict {
    /// Creates a conflict for `operation` against the reported server state.
    pub fn new(operation: QueuedOperation, server_data: Value, detected_at: Timestamp) -> Self {
        let client_data = operation.payload.clone();
        Self {
            id: ConflictId::new(),
            operation,
            server_data,
            client_data,
            detected_at,
        }
    }

    /// Encodes a list of conflicts as a JSON array.
    pub fn encode_all(conflicts: &[SyncConflict]) -> ProtocolResult<String> {
        Ok(serde_json::to_string(conflicts)?)
    }

    /// Decodes a JSON array of conflicts.
    pub fn decode_all(json: &str) -> ProtocolResult<Vec<SyncConflict>> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Strategy used to resolve a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionStrategy {
    /// Re-send the client's original payload.
    AcceptClient,
    /// Adopt the server's state.
    AcceptServer,
    /// Use a caller-supplied payload, or a shallow merge of both sides.
    Merge,
}

impl ResolutionStrategy {
    /// Parses a strategy from a short name (`client`, `server`, `merge`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "client" | "accept-client" | "acceptclient" => Some(Self::AcceptClient),
            "server" | "accept-server" | "acceptserver" => Some(Self::AcceptServer),
            "merge" => Some(Self::Merge),
            _ => None,
        }
    }
}

/// Shallow, field-level merge where client fields win.
///
/// When both sides are JSON objects, the result holds every server field
/// overlaid by every client field. Nested objects are replaced, not merged.
/// If either side is not an object the client value is returned unchanged.
pub fn shallow_merge(server: &Value, client: &Value) -> Value {
    match (server, client) {
        (Value::Object(server_map), Value::Object(client_map)) => {
            let mut merged = server_map.clone();
            for (key, value) in client_map {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => client.clone(),
    }
}
