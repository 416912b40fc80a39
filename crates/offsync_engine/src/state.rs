//! Engine status and drain pass reports.

use offsync_protocol::{OperationCounts, QueuedOperation, SyncConflict, Timestamp};
use std::fmt;
use std::time::Duration;

/// Aggregate status of the sync engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    /// No pass is running and nothing needs attention.
    #[default]
    Idle,
    /// A drain pass is in progress.
    Syncing,
    /// The last pass aborted on a pass-level fault.
    ///
    /// The operation that caused the fault stays queued, so a fault that
    /// repeats (a 409 body that never parses, say) aborts every later pass
    /// as well. The abort message in [`DrainOutcome::Aborted`] names the
    /// operation.
    Error,
    /// Unresolved conflicts are waiting for a decision.
    Conflict,
}

impl SyncStatus {
    /// Returns the status name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Error => "error",
            SyncStatus::Conflict => "conflict",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time snapshot of everything the engine exposes to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineState {
    /// Current connectivity.
    pub is_online: bool,
    /// Aggregate status.
    pub sync_status: SyncStatus,
    /// Queued operations in enqueue order.
    pub queue: Vec<QueuedOperation>,
    /// Unresolved conflicts in detection order.
    pub conflicts: Vec<SyncConflict>,
    /// Completion time of the last completed pass.
    pub last_sync_time: Option<Timestamp>,
}

impl EngineState {
    /// Per-status counts of the queue.
    pub fn counts(&self) -> OperationCounts {
        OperationCounts::tally(&self.queue)
    }

    /// Number of `Pending` operations.
    pub fn pending_count(&self) -> usize {
        self.counts().pending
    }

    /// Number of `Failed` operations.
    pub fn failed_count(&self) -> usize {
        self.counts().failed
    }

    /// Number of `DeadLetter` operations.
    pub fn dead_letter_count(&self) -> usize {
        self.counts().dead_letter
    }
}

/// Why a drain request did not start a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The device is offline.
    Offline,
    /// No operation is eligible for delivery.
    NothingToSync,
    /// Another pass is already running.
    AlreadyRunning,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::Offline => "offline",
            SkipReason::NothingToSync => "nothing to sync",
            SkipReason::AlreadyRunning => "already running",
        };
        f.write_str(s)
    }
}

/// How a drain request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The pass ran to completion.
    Completed,
    /// No pass was started; engine state is untouched.
    Skipped(SkipReason),
    /// The pass hit a pass-level fault and was rolled back.
    Aborted(String),
}

/// Summary of one drain request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainReport {
    /// How the request ended.
    pub outcome: DrainOutcome,
    /// Operations submitted to the transport.
    pub attempted: usize,
    /// Operations accepted by the server.
    pub succeeded: usize,
    /// Operations that failed and remain retryable.
    pub failed: usize,
    /// Operations that exhausted their retry budget in this pass.
    pub dead_lettered: usize,
    /// Operations moved to the conflict set.
    pub conflicted: usize,
    /// Wall time of the pass.
    pub duration: Duration,
}

impl DrainReport {
    /// A report for a request that never started a pass.
    pub fn skipped(reason: SkipReason) -> Self {
        Self::with_outcome(DrainOutcome::Skipped(reason))
    }

    pub(crate) fn with_outcome(outcome: DrainOutcome) -> Self {
        Self {
            outcome,
            attempted: 0,
            succeeded: 0,
            failed: 0,
            dead_lettered: 0,
            conflicted: 0,
            duration: Duration::ZERO,
        }
    }

    /// Returns true if the pass ran to completion.
    pub fn is_completed(&self) -> bool {
        self.outcome == DrainOutcome::Completed
    }

    /// Returns true if no pass was started.
    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, DrainOutcome::Skipped(_))
    }

    /// Returns the skip reason, if the request was skipped.
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self.outcome {
            DrainOutcome::Skipped(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for DrainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            DrainOutcome::Skipped(reason) => write!(f, "skipped ({reason})"),
            DrainOutcome::Aborted(message) => {
                write!(f, "aborted after {} attempt(s): {message}", self.attempted)
            }
            DrainOutcome::Completed => write!(
                f,
                "completed in {:?}: {} attempted, {} succeeded, {} failed, {} dead-lettered, {} conflicted",
                self.duration,
                self.attempted,
                self.succeeded,
                self.failed,
                self.dead_lettered,
                self.conflicted
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use offsync_protocol::{OperationKind, OperationStatus};
    use serde_json::json;

    #[test]
    fn status_names() {
        assert_eq!(SyncStatus::default(), SyncStatus::Idle);
        assert_eq!(SyncStatus::Conflict.to_string(), "conflict");
    }

    #[test]
    fn state_counts() {
        let mut failed = QueuedOperation::new(OperationKind::Update, "a", json!(1), Utc::now());
        failed.status = OperationStatus::Failed;
        let mut dead = QueuedOperation::new(OperationKind::Update, "b", json!(2), Utc::now());
        dead.status = OperationStatus::DeadLetter;
        let pending = QueuedOperation::new(OperationKind::Create, "c", json!(3), Utc::now());

        let state = EngineState {
            is_online: true,
            sync_status: SyncStatus::Idle,
            queue: vec![failed, dead, pending],
            conflicts: Vec::new(),
            last_sync_time: None,
        };

        assert_eq!(state.pending_count(), 1);
        assert_eq!(state.failed_count(), 1);
        assert_eq!(state.dead_letter_count(), 1);
    }

    #[test]
    fn skipped_report() {
        let report = DrainReport::skipped(SkipReason::Offline);
        assert!(report.is_skipped());
        assert!(!report.is_completed());
        assert_eq!(report.skip_reason(), Some(SkipReason::Offline));
        assert_eq!(report.to_string(), "skipped (offline)");
    }

    #[test]
    fn completed_report_display() {
        let mut report = DrainReport::with_outcome(DrainOutcome::Completed);
        report.attempted = 3;
        report.succeeded = 2;
        report.conflicted = 1;

        let text = report.to_string();
        assert!(text.contains("3 attempted"));
        assert!(text.contains("1 conflicted"));
        assert_eq!(report.skip_reason(), None);
    }
}
