//! The sync engine service object.

use crate::clock::Clock;
use crate::command::Command;
use crate::config::SyncConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{SyncError, SyncResult};
use crate::queue::OperationQueue;
use crate::resolver::ConflictResolver;
use crate::state::{DrainOutcome, DrainReport, EngineState, SkipReason, SyncStatus};
use crate::transport::{DeliveryOutcome, SyncTransport};
use chrono::{DateTime, Utc};
use offsync_protocol::{
    ConflictId, OperationId, OperationKind, OperationStatus, ProtocolError, ProtocolResult,
    QueuedOperation, ResolutionStrategy, SyncConflict, SyncRequest, Timestamp,
};
use offsync_storage::DurableStore;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

/// Store key of the persisted operation queue.
pub const QUEUE_KEY: &str = "offline_queue";
/// Store key of the persisted conflict set.
pub const CONFLICTS_KEY: &str = "offline_conflicts";
/// Store key of the last completed pass time.
pub const LAST_SYNC_KEY: &str = "offline_last_sync";

/// Offline-tolerant mutation sync engine.
///
/// Owns the operation queue and the conflict set, persists both to a
/// [`DurableStore`] on every change, and reconciles the queue with the
/// server through a [`SyncTransport`] when asked to [`drain`](Self::drain).
///
/// # Invariants
///
/// - At most one drain pass runs at a time
/// - Persisted state is loaded once, at [`open`](Self::open)
/// - In-memory state stays authoritative when the store fails
/// - No `parking_lot` lock is held across an `.await`
pub struct SyncEngine<T: SyncTransport, S: DurableStore> {
    config: SyncConfig,
    transport: Arc<T>,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    connectivity: ConnectivityMonitor,
    queue: RwLock<OperationQueue>,
    conflicts: RwLock<ConflictResolver>,
    last_sync: RwLock<Option<Timestamp>>,
    status: watch::Sender<SyncStatus>,
    drain_lock: Mutex<()>,
    auto_sync: AtomicBool,
}

impl<T: SyncTransport, S: DurableStore> SyncEngine<T, S> {
    /// Opens an engine over the given collaborators.
    ///
    /// Loads the queue, the conflict set and the last sync time from `store`,
    /// moves operations left in `Syncing` by an interrupted session back to
    /// `Pending`, and starts in `Conflict` if conflicts were loaded. Missing
    /// or unreadable keys start empty.
    pub fn open(
        config: SyncConfig,
        transport: Arc<T>,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        connectivity: ConnectivityMonitor,
    ) -> Self {
        let operations = load(store.as_ref(), QUEUE_KEY, QueuedOperation::decode_all);
        let conflicts = load(store.as_ref(), CONFLICTS_KEY, SyncConflict::decode_all);
        let last_sync = load(store.as_ref(), LAST_SYNC_KEY, |raw| {
            DateTime::parse_from_rfc3339(raw.trim())
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| ProtocolError::invalid_structure(e.to_string()))
        });

        let mut queue = OperationQueue::from_operations(operations.unwrap_or_default());
        let conflicts = ConflictResolver::from_conflicts(conflicts.unwrap_or_default());

        let swept = queue.reset_stale_syncing();
        let status = if conflicts.is_empty() {
            SyncStatus::Idle
        } else {
            SyncStatus::Conflict
        };
        let (status, _) = watch::channel(status);

        info!(
            operations = queue.len(),
            conflicts = conflicts.len(),
            swept,
            "sync engine opened"
        );

        let auto_sync = AtomicBool::new(config.auto_sync);
        let engine = Self {
            config,
            transport,
            store,
            clock,
            connectivity,
            queue: RwLock::new(queue),
            conflicts: RwLock::new(conflicts),
            last_sync: RwLock::new(last_sync),
            status,
            drain_lock: Mutex::new(()),
            auto_sync,
        };

        if swept > 0 {
            engine.persist_queue(&engine.queue.read());
        }
        engine
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Returns the durable store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the connectivity monitor.
    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    // ------------------------------------------------------------------
    // Queue
    // ------------------------------------------------------------------

    /// Records a mutation for later delivery.
    ///
    /// Never blocks on the network and works the same online or offline.
    pub fn enqueue_operation(
        &self,
        kind: OperationKind,
        resource: impl Into<String>,
        payload: Value,
    ) -> OperationId {
        let resource = resource.into();
        let mut queue = self.queue.write();
        let id = queue.enqueue(kind, resource.as_str(), payload, self.clock.now());
        self.persist_queue(&queue);
        debug!(op_id = %id, %resource, %kind, "operation enqueued");
        id
    }

    /// Returns queued operations, optionally only those for `resource`.
    pub fn get_queued_operations(&self, resource: Option<&str>) -> Vec<QueuedOperation> {
        self.queue.read().query(resource)
    }

    /// Drops every queued operation and erases the persisted queue.
    pub fn clear_queue(&self) {
        let mut queue = self.queue.write();
        let dropped = queue.len();
        queue.clear();
        if let Err(e) = self.store.remove(QUEUE_KEY) {
            warn!(error = %e, "failed to erase persisted queue");
        }
        info!(dropped, "queue cleared");
    }

    /// Moves every `Failed` operation back to `Pending`.
    pub fn retry_failed(&self) -> usize {
        let mut queue = self.queue.write();
        let moved = queue.mark_retry_eligible();
        if moved > 0 {
            self.persist_queue(&queue);
            info!(moved, "failed operations marked for retry");
        }
        moved
    }

    /// Moves every `DeadLetter` operation back to `Pending` with a fresh
    /// retry budget.
    pub fn requeue_dead_letters(&self) -> usize {
        let mut queue = self.queue.write();
        let moved = queue.requeue_dead_letters();
        if moved > 0 {
            self.persist_queue(&queue);
            info!(moved, "dead-lettered operations requeued");
        }
        moved
    }

    /// Applies a command locally and enqueues its server write.
    pub fn execute<C: Command + ?Sized>(&self, command: &C) -> OperationId {
        command.apply();
        let mutation = command.commit();
        self.enqueue_operation(mutation.kind, mutation.resource, mutation.payload)
    }

    // ------------------------------------------------------------------
    // Drain
    // ------------------------------------------------------------------

    /// Runs one drain pass.
    ///
    /// Skips without touching any state when offline, when nothing is
    /// eligible, or when another pass is already running. Operations are
    /// delivered one at a time in enqueue order.
    pub async fn drain(&self) -> DrainReport {
        if !self.connectivity.is_online() {
            debug!("drain skipped: offline");
            return DrainReport::skipped(SkipReason::Offline);
        }

        let Ok(_pass) = self.drain_lock.try_lock() else {
            debug!("drain skipped: pass already running");
            return DrainReport::skipped(SkipReason::AlreadyRunning);
        };

        let started = Instant::now();
        let (selected, snapshot) = {
            let queue = self.queue.read();
            (queue.eligible(self.clock.now()), queue.clone())
        };
        if selected.is_empty() {
            debug!("drain skipped: nothing to sync");
            return DrainReport::skipped(SkipReason::NothingToSync);
        }
        let known_conflicts: HashSet<ConflictId> =
            self.conflicts.read().list().iter().map(|c| c.id).collect();

        self.status.send_replace(SyncStatus::Syncing);
        info!(operations = selected.len(), "drain pass started");

        let mut report = DrainReport::with_outcome(DrainOutcome::Completed);
        let mut blocked: HashSet<String> = HashSet::new();

        for id in selected {
            let request = {
                let mut queue = self.queue.write();
                let Some(op) = queue.get_mut(id) else {
                    continue;
                };
                if self.config.per_resource_barrier && blocked.contains(&op.resource) {
                    debug!(op_id = %id, resource = %op.resource, "held back by earlier failure");
                    continue;
                }
                op.status = OperationStatus::Syncing;
                let request = SyncRequest::from_operation(op);
                self.persist_queue(&queue);
                request
            };

            report.attempted += 1;
            debug!(op_id = %id, resource = %request.resource, "delivering operation");

            match self.transport.submit(&request).await {
                Ok(DeliveryOutcome::Accepted) => {
                    let mut queue = self.queue.write();
                    if let Some(op) = queue.get_mut(id) {
                        op.status = OperationStatus::Succeeded;
                        op.last_error = None;
                        op.next_attempt_at = None;
                    }
                    self.persist_queue(&queue);
                    report.succeeded += 1;
                }
                Ok(DeliveryOutcome::Conflict { server_data }) => {
                    blocked.insert(request.resource.clone());
                    if self.capture_conflict(id, server_data, &mut report) {
                        report.conflicted += 1;
                    }
                }
                Ok(DeliveryOutcome::Rejected { status, message }) => {
                    blocked.insert(request.resource.clone());
                    let reason = SyncError::Rejected { status, message }.to_string();
                    self.record_failure(id, &reason, true, &mut report);
                }
                Err(e) if e.is_pass_fault() => {
                    warn!(
                        op_id = %id,
                        resource = %request.resource,
                        error = %e,
                        "operation aborted the pass and stays queued"
                    );
                    let fault = format!("operation {id} ({}): {e}", request.resource);
                    return self.abort_pass(snapshot, &known_conflicts, fault, report, started);
                }
                Err(e) => {
                    blocked.insert(request.resource.clone());
                    self.record_failure(id, &e.to_string(), e.is_retryable(), &mut report);
                }
            }
        }

        {
            let mut queue = self.queue.write();
            queue.remove_succeeded();
            self.persist_queue(&queue);
        }

        let finished_at = self.clock.now();
        *self.last_sync.write() = Some(finished_at);
        if let Err(e) = self.store.put(LAST_SYNC_KEY, &finished_at.to_rfc3339()) {
            warn!(error = %e, "failed to persist last sync time");
        }

        let status = if self.conflicts.read().is_empty() {
            SyncStatus::Idle
        } else {
            SyncStatus::Conflict
        };
        self.status.send_replace(status);

        report.duration = started.elapsed();
        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            dead_lettered = report.dead_lettered,
            conflicted = report.conflicted,
            %status,
            "drain pass completed"
        );
        report
    }

    /// Moves a conflicted operation from the queue into the conflict set.
    ///
    /// The conflict is persisted before the operation leaves the persisted
    /// queue, so an interruption in between leaves a duplicate rather than
    /// losing the write. If the conflict cannot be persisted the operation
    /// stays queued and is recorded as a failed attempt.
    fn capture_conflict(
        &self,
        id: OperationId,
        server_data: Value,
        report: &mut DrainReport,
    ) -> bool {
        let Some(mut operation) = self.queue.read().get(id).cloned() else {
            return false;
        };
        operation.status = OperationStatus::Pending;

        let conflict = SyncConflict::new(operation, server_data, self.clock.now());
        let conflict_id = conflict.id;
        let resource = conflict.operation.resource.clone();
        {
            let mut conflicts = self.conflicts.write();
            conflicts.add(conflict);
            if let Err(e) = self.persist_conflicts(&conflicts) {
                conflicts.remove(conflict_id);
                drop(conflicts);
                self.record_failure(id, &format!("conflict not recorded: {e}"), true, report);
                return false;
            }
        }
        warn!(op_id = %id, %conflict_id, %resource, "conflict detected");

        let mut queue = self.queue.write();
        queue.remove(id);
        self.persist_queue(&queue);
        true
    }

    /// Records a failed delivery, dead-lettering the operation once its
    /// retry budget is spent or when the failure is not `retryable`.
    fn record_failure(
        &self,
        id: OperationId,
        reason: &str,
        retryable: bool,
        report: &mut DrainReport,
    ) {
        let now = self.clock.now();
        let mut queue = self.queue.write();
        let Some(op) = queue.get_mut(id) else {
            return;
        };

        let attempts = op.retry_count.saturating_add(1);
        if !retryable || self.config.retry.is_exhausted(attempts) {
            op.record_failure(reason, None);
            op.status = OperationStatus::DeadLetter;
            warn!(
                op_id = %id,
                resource = %op.resource,
                retry_count = op.retry_count,
                error = reason,
                "operation dead-lettered"
            );
            report.dead_lettered += 1;
        } else {
            let delay = self.config.retry.delay_for_attempt(attempts);
            let next_attempt_at = if delay.is_zero() {
                None
            } else {
                chrono::Duration::from_std(delay).ok().map(|d| now + d)
            };
            op.record_failure(reason, next_attempt_at);
            warn!(
                op_id = %id,
                resource = %op.resource,
                retry_count = op.retry_count,
                error = reason,
                "delivery failed"
            );
            report.failed += 1;
        }
        self.persist_queue(&queue);
    }

    /// Rolls the queue and conflict set back to their pre-pass state.
    ///
    /// Operations enqueued during the pass are kept; conflicts detected
    /// during the pass are dropped. A queue cleared during the pass stays
    /// cleared.
    fn abort_pass(
        &self,
        snapshot: OperationQueue,
        known_conflicts: &HashSet<ConflictId>,
        fault: String,
        mut report: DrainReport,
        started: Instant,
    ) -> DrainReport {
        {
            let mut queue = self.queue.write();
            queue.restore(snapshot);
            self.persist_queue(&queue);
        }
        {
            let mut conflicts = self.conflicts.write();
            conflicts.retain(|c| known_conflicts.contains(&c.id));
            let _ = self.persist_conflicts(&conflicts);
        }

        self.status.send_replace(SyncStatus::Error);
        error!(error = %fault, attempted = report.attempted, "drain pass aborted");

        report.outcome = DrainOutcome::Aborted(fault);
        report.succeeded = 0;
        report.failed = 0;
        report.dead_lettered = 0;
        report.conflicted = 0;
        report.duration = started.elapsed();
        report
    }

    // ------------------------------------------------------------------
    // Conflicts
    // ------------------------------------------------------------------

    /// Resolves a conflict by enqueuing a new operation.
    ///
    /// The new operation keeps the kind and resource of the conflicted one;
    /// its payload follows `strategy`. `merged` is only used with
    /// [`ResolutionStrategy::Merge`].
    pub fn resolve_conflict(
        &self,
        id: ConflictId,
        strategy: ResolutionStrategy,
        merged: Option<Value>,
    ) -> SyncResult<OperationId> {
        let mut conflicts = self.conflicts.write();
        let conflict = conflicts.get(id).ok_or(SyncError::ConflictNotFound(id))?;
        let payload = ConflictResolver::resolve_payload(conflict, strategy, merged);
        let kind = conflict.operation.kind;
        let resource = conflict.operation.resource.clone();

        let op_id = self.enqueue_operation(kind, resource.as_str(), payload);
        conflicts.remove(id);
        let _ = self.persist_conflicts(&conflicts);
        let remaining = conflicts.len();
        drop(conflicts);

        self.status.send_if_modified(|status| {
            let next = match *status {
                SyncStatus::Syncing | SyncStatus::Error => return false,
                _ if remaining > 0 => SyncStatus::Conflict,
                _ => SyncStatus::Idle,
            };
            let changed = *status != next;
            *status = next;
            changed
        });

        info!(conflict_id = %id, op_id = %op_id, %resource, ?strategy, "conflict resolved");
        Ok(op_id)
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// Returns true if the device is online.
    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// Feeds a platform connectivity signal. Returns true on a transition.
    pub fn set_online(&self, online: bool) -> bool {
        self.connectivity.set_online(online)
    }

    /// Returns the aggregate status.
    pub fn sync_status(&self) -> SyncStatus {
        *self.status.borrow()
    }

    /// Returns a receiver notified on every status change.
    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Returns a copy of the queue in enqueue order.
    pub fn queue(&self) -> Vec<QueuedOperation> {
        self.queue.read().as_slice().to_vec()
    }

    /// Returns true if the queue holds no operations.
    pub fn is_queue_empty(&self) -> bool {
        self.queue.read().is_empty()
    }

    /// Returns a copy of the unresolved conflicts in detection order.
    pub fn conflicts(&self) -> Vec<SyncConflict> {
        self.conflicts.read().list().to_vec()
    }

    /// Returns the completion time of the last completed pass.
    pub fn last_sync_time(&self) -> Option<Timestamp> {
        *self.last_sync.read()
    }

    /// Number of `Pending` operations.
    pub fn pending_count(&self) -> usize {
        self.queue.read().counts().pending
    }

    /// Number of `Failed` operations.
    pub fn failed_count(&self) -> usize {
        self.queue.read().counts().failed
    }

    /// Number of `DeadLetter` operations.
    pub fn dead_letter_count(&self) -> usize {
        self.queue.read().counts().dead_letter
    }

    /// Returns a snapshot of everything observable.
    pub fn state(&self) -> EngineState {
        EngineState {
            is_online: self.is_online(),
            sync_status: self.sync_status(),
            queue: self.queue(),
            conflicts: self.conflicts(),
            last_sync_time: self.last_sync_time(),
        }
    }

    /// Returns true if the scheduler may drain on its own.
    pub fn auto_sync(&self) -> bool {
        self.auto_sync.load(Ordering::SeqCst)
    }

    /// Enables or disables scheduler-driven drains.
    pub fn set_auto_sync(&self, enabled: bool) {
        self.auto_sync.store(enabled, Ordering::SeqCst);
        info!(enabled, "auto-sync toggled");
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    fn persist_queue(&self, queue: &OperationQueue) {
        let _ = persist(
            self.store.as_ref(),
            QUEUE_KEY,
            QueuedOperation::encode_all(queue.as_slice()),
        );
    }

    fn persist_conflicts(&self, conflicts: &ConflictResolver) -> SyncResult<()> {
        persist(
            self.store.as_ref(),
            CONFLICTS_KEY,
            SyncConflict::encode_all(conflicts.list()),
        )
    }
}

impl<T: SyncTransport, S: DurableStore> std::fmt::Debug for SyncEngine<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let queued = self.queue.read().len();
        let conflicts = self.conflicts.read().len();
        f.debug_struct("SyncEngine")
            .field("endpoint", &self.config.endpoint)
            .field("status", &self.sync_status())
            .field("online", &self.is_online())
            .field("queued", &queued)
            .field("conflicts", &conflicts)
            .finish()
    }
}

/// Reads and decodes a key. Missing keys yield `None`; read and decode
/// failures are logged and also yield `None`.
fn load<S, V>(store: &S, key: &str, decode: impl FnOnce(&str) -> ProtocolResult<V>) -> Option<V>
where
    S: DurableStore + ?Sized,
{
    let raw = match store.get(key) {
        Ok(raw) => raw?,
        Err(e) => {
            warn!(key, error = %e, "failed to read persisted state");
            return None;
        }
    };
    match decode(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "discarding corrupt persisted state");
            None
        }
    }
}

/// Writes an encoded value. Failures are logged and returned.
fn persist<S>(store: &S, key: &str, encoded: ProtocolResult<String>) -> SyncResult<()>
where
    S: DurableStore + ?Sized,
{
    let result = encoded
        .map_err(SyncError::from)
        .and_then(|json| store.put(key, &json).map_err(SyncError::from));
    if let Err(e) = &result {
        warn!(key, error = %e, "failed to persist state");
    }
    result
}
