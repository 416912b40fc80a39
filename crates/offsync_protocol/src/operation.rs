//! Queued operations.

use crate::error::ProtocolResult;
use crate::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a queued operation.
///
/// Operation IDs are random UUIDs generated at enqueue time. A resolved
/// conflict always produces an operation with a fresh ID.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(Uuid);

impl OperationId {
    /// Creates a new random operation ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses an operation ID from its hyphenated string form.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OperationId({})", self.0)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of mutation an operation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// A new entity was created.
    Create,
    /// An existing entity was updated.
    Update,
    /// An entity was deleted.
    Delete,
}

impl OperationKind {
    /// Returns the wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "Create",
            OperationKind::Update => "Update",
            OperationKind::Delete => "Delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a queued operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationStatus {
    /// Waiting for the next drain pass.
    Pending,
    /// Currently being delivered.
    Syncing,
    /// The last delivery attempt failed; retried on a later pass.
    Failed,
    /// Delivered; removed at the end of the pass.
    Succeeded,
    /// Retry budget exhausted; requires explicit intervention.
    DeadLetter,
}

impl OperationStatus {
    /// Returns true if a drain pass may select an operation in this status.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OperationStatus::Pending | OperationStatus::Failed)
    }
}

/// A single durable record of one intended mutation against one resource.
///
/// # Invariants
///
/// - `retry_count` only grows, except when a dead-lettered operation is
///   explicitly requeued
/// - `next_attempt_at` is only set on `Failed` operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOperation {
    /// Unique operation ID.
    pub id: OperationId,
    /// Mutation kind.
    pub kind: OperationKind,
    /// Logical collection or entity the mutation targets.
    pub resource: String,
    /// Opaque domain data.
    pub payload: Value,
    /// Enqueue time; defines delivery order.
    pub enqueued_at: Timestamp,
    /// Number of failed delivery attempts.
    pub retry_count: u32,
    /// Lifecycle status.
    pub status: OperationStatus,
    /// Human-readable reason of the last failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Earliest time a failed operation becomes eligible again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<Timestamp>,
}

impl QueuedOperation {
    /// Creates a new pending operation.
    pub fn new(
        kind: OperationKind,
        resource: impl Into<String>,
        payload: Value,
        now: Timestamp,
    ) -> Self {
        Self {
            id: OperationId::new(),
            kind,
            resource: resource.into(),
            payload,
            enqueued_at: now,
            retry_count: 0,
            status: OperationStatus::Pending,
            last_error: None,
            next_attempt_at: None,
        }
    }

    /// Returns true if a drain pass starting at `now` should deliver this
    /// operation.
    pub fn is_eligible(&self, now: Timestamp) -> bool {
        match self.status {
            OperationStatus::Failed => self.next_attempt_at.map_or(true, |at| at <= now),
            status => status.is_retryable(),
        }
    }

    /// Records a failed delivery attempt.
    pub fn record_failure(&mut self, error: impl Into<String>, next_attempt_at: Option<Timestamp>) {
        self.retry_count = self.retry_count.saturating_add(1);
        self.status = OperationStatus::Failed;
        self.last_error = Some(error.into());
        self.next_attempt_at = next_attempt_at;
    }

    /// Moves the operation back to `Pending`.
    pub fn reset_to_pending(&mut self) {
        self.status = OperationStatus::Pending;
        self.next_attempt_at = None;
    }

    /// Encodes a list of operations as a JSON array.
    pub fn encode_all(operations: &[QueuedOperation]) -> ProtocolResult<String> {
        Ok(serde_json::to_string(operations)?)
    }

    /// Decodes a JSON array of operations.
    pub fn decode_all(json: &str) -> ProtocolResult<Vec<QueuedOperation>> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Per-status counts over a set of operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationCounts {
    /// Operations in `Pending`.
    pub pending: usize,
    /// Operations in `Syncing`.
    pub syncing: usize,
    /// Operations in `Failed`.
    pub failed: usize,
    /// Operations in `Succeeded`.
    pub succeeded: usize,
    /// Operations in `DeadLetter`.
    pub dead_letter: usize,
}

impl OperationCounts {
    /// Counts the statuses of the given operations.
    pub fn tally<'a>(operations: impl IntoIterator<Item = &'a QueuedOperation>) -> Self {
        let mut counts = Self::default();
        for op in operations {
            match op.status {
                OperationStatus::Pending => counts.pending += 1,
                OperationStatus::Syncing => counts.syncing += 1,
                OperationStatus::Failed => counts.failed += 1,
                OperationStatus::Succeeded => counts.succeeded += 1,
                OperationStatus::DeadLetter => counts.dead_letter += 1,
            }
        }
        counts
    }
}
