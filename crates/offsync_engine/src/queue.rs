//! Ordered queue of pending mutations.

use chrono::{DateTime, Utc};
use offsync_protocol::{
    OperationCounts, OperationId, OperationKind, OperationStatus, QueuedOperation,
};
use serde_json::Value;
use std::collections::HashSet;

/// An ordered, append-only-until-resolved collection of operations.
///
/// # Invariants
///
/// - Operations are kept in enqueue order
/// - Only the sync driver and the conflict resolver remove operations
/// - `Succeeded` operations never outlive the pass that completed them
/// - `generation` changes on every [`clear`](Self::clear)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationQueue {
    operations: Vec<QueuedOperation>,
    generation: u64,
}

impl OperationQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a queue from persisted operations, keeping their order.
    pub fn from_operations(operations: Vec<QueuedOperation>) -> Self {
        Self {
            operations,
            generation: 0,
        }
    }

    /// Appends a new pending operation and returns its ID.
    pub fn enqueue(
        &mut self,
        kind: OperationKind,
        resource: impl Into<String>,
        payload: Value,
        now: DateTime<Utc>,
    ) -> OperationId {
        let operation = QueuedOperation::new(kind, resource, payload, now);
        let id = operation.id;
        self.operations.push(operation);
        id
    }

    /// Returns all operations, or those targeting `resource`, in enqueue order.
    pub fn query(&self, resource: Option<&str>) -> Vec<QueuedOperation> {
        self.operations
            .iter()
            .filter(|op| resource.map_or(true, |r| op.resource == r))
            .cloned()
            .collect()
    }

    /// Returns the operation with the given ID.
    pub fn get(&self, id: OperationId) -> Option<&QueuedOperation> {
        self.operations.iter().find(|op| op.id == id)
    }

    /// Returns the operation with the given ID for modification.
    pub fn get_mut(&mut self, id: OperationId) -> Option<&mut QueuedOperation> {
        self.operations.iter_mut().find(|op| op.id == id)
    }

    /// Removes and returns the operation with the given ID.
    pub fn remove(&mut self, id: OperationId) -> Option<QueuedOperation> {
        let index = self.operations.iter().position(|op| op.id == id)?;
        Some(self.operations.remove(index))
    }

    /// Removes every `Succeeded` operation, returning how many were removed.
    pub fn remove_succeeded(&mut self) -> usize {
        let before = self.operations.len();
        self.operations
            .retain(|op| op.status != OperationStatus::Succeeded);
        before - self.operations.len()
    }

    /// IDs of operations a pass starting at `now` should deliver, in
    /// `enqueued_at` order (queue order for equal timestamps).
    pub fn eligible(&self, now: DateTime<Utc>) -> Vec<OperationId> {
        let mut eligible: Vec<&QueuedOperation> = self
            .operations
            .iter()
            .filter(|op| op.is_eligible(now))
            .collect();
        eligible.sort_by_key(|op| op.enqueued_at);
        eligible.into_iter().map(|op| op.id).collect()
    }

    /// Moves every `Failed` operation back to `Pending`.
    ///
    /// Retry counts are kept. Returns the number of operations moved.
    pub fn mark_retry_eligible(&mut self) -> usize {
        let mut moved = 0;
        for op in &mut self.operations {
            if op.status == OperationStatus::Failed {
                op.reset_to_pending();
                moved += 1;
            }
        }
        moved
    }

    /// Moves every `DeadLetter` operation back to `Pending` with a fresh
    /// retry budget.
    pub fn requeue_dead_letters(&mut self) -> usize {
        let mut moved = 0;
        for op in &mut self.operations {
            if op.status == OperationStatus::DeadLetter {
                op.reset_to_pending();
                op.retry_count = 0;
                moved += 1;
            }
        }
        moved
    }

    /// Moves operations left in `Syncing` by an interrupted session back to
    /// `Pending`.
    pub fn reset_stale_syncing(&mut self) -> usize {
        let mut moved = 0;
        for op in &mut self.operations {
            if op.status == OperationStatus::Syncing {
                op.reset_to_pending();
                moved += 1;
            }
        }
        moved
    }

    /// Per-status counts.
    pub fn counts(&self) -> OperationCounts {
        OperationCounts::tally(&self.operations)
    }

    /// Removes every operation.
    pub fn clear(&mut self) {
        self.operations.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    /// Rolls back to `snapshot`, a clone taken earlier from this queue.
    ///
    /// Operations enqueued after the snapshot are kept behind the restored
    /// ones. If the queue was cleared after the snapshot was taken, nothing
    /// from the snapshot comes back and the queue is left as it is.
    pub fn restore(&mut self, snapshot: OperationQueue) {
        if snapshot.generation != self.generation {
            return;
        }
        let before: HashSet<OperationId> = snapshot.operations.iter().map(|op| op.id).collect();
        let mut restored = snapshot.operations;
        restored.extend(
            self.operations
                .drain(..)
                .filter(|op| !before.contains(&op.id)),
        );
        self.operations = restored;
    }

    /// Returns the number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns true if the queue holds no operations.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Iterates over operations in queue order.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedOperation> {
        self.operations.iter()
    }

    /// Borrows the operations as a slice.
    pub fn as_slice(&self) -> &[QueuedOperation] {
        &self.operations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn enqueue_appends_pending() {
        let mut queue = OperationQueue::new();
        let id1 = queue.enqueue(OperationKind::Create, "case", json!({"n": 1}), at(0));
        let id2 = queue.enqueue(OperationKind::Update, "case", json!({"n": 2}), at(1));

        assert_ne!(id1, id2);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.get(id1).unwrap().status, OperationStatus::Pending);
        assert_eq!(queue.as_slice()[1].id, id2);
    }

    #[test]
    fn query_filters_by_resource() {
        let mut queue = OperationQueue::new();
        queue.enqueue(OperationKind::Create, "case", json!(1), at(0));
        queue.enqueue(OperationKind::Create, "invoice", json!(2), at(1));
        queue.enqueue(OperationKind::Update, "case", json!(3), at(2));

        let cases = queue.query(Some("case"));
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].payload, json!(1));
        assert_eq!(cases[1].payload, json!(3));
        assert_eq!(queue.query(None).len(), 3);
        assert!(queue.query(Some("contact")).is_empty());
    }

    #[test]
    fn eligible_orders_by_enqueue_time() {
        let mut queue = OperationQueue::new();
        let late = queue.enqueue(OperationKind::Update, "a", json!(1), at(10));
        let early = queue.enqueue(OperationKind::Update, "b", json!(2), at(5));
        let tie = queue.enqueue(OperationKind::Update, "c", json!(3), at(10));

        assert_eq!(queue.eligible(at(20)), vec![early, late, tie]);
    }

    #[test]
    fn eligible_skips_backoff_and_terminal_states() {
        let mut queue = OperationQueue::new();
        let waiting = queue.enqueue(OperationKind::Update, "a", json!(1), at(0));
        let dead = queue.enqueue(OperationKind::Update, "b", json!(2), at(1));
        let ready = queue.enqueue(OperationKind::Update, "c", json!(3), at(2));

        queue
            .get_mut(waiting)
            .unwrap()
            .record_failure("HTTP 500", Some(at(60)));
        queue.get_mut(dead).unwrap().status = OperationStatus::DeadLetter;

        assert_eq!(queue.eligible(at(30)), vec![ready]);
        assert_eq!(queue.eligible(at(60)), vec![waiting, ready]);
    }

    #[test]
    fn mark_retry_eligible_keeps_retry_count() {
        let mut queue = OperationQueue::new();
        let id = queue.enqueue(OperationKind::Delete, "case", json!(null), at(0));
        queue
            .get_mut(id)
            .unwrap()
            .record_failure("HTTP 502", Some(at(600)));

        assert_eq!(queue.mark_retry_eligible(), 1);
        let op = queue.get(id).unwrap();
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.retry_count, 1);
        assert_eq!(op.next_attempt_at, None);
        assert_eq!(queue.mark_retry_eligible(), 0);
    }

    #[test]
    fn requeue_dead_letters_resets_budget() {
        let mut queue = OperationQueue::new();
        let id = queue.enqueue(OperationKind::Update, "case", json!(1), at(0));
        {
            let op = queue.get_mut(id).unwrap();
            op.retry_count = 10;
            op.status = OperationStatus::DeadLetter;
        }

        assert_eq!(queue.requeue_dead_letters(), 1);
        let op = queue.get(id).unwrap();
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.retry_count, 0);
    }

    #[test]
    fn reset_stale_syncing() {
        let mut queue = OperationQueue::new();
        let id = queue.enqueue(OperationKind::Update, "case", json!(1), at(0));
        queue.get_mut(id).unwrap().status = OperationStatus::Syncing;

        assert_eq!(queue.reset_stale_syncing(), 1);
        assert_eq!(queue.get(id).unwrap().status, OperationStatus::Pending);
    }

    #[test]
    fn remove_succeeded_and_remove() {
        let mut queue = OperationQueue::new();
        let a = queue.enqueue(OperationKind::Create, "a", json!(1), at(0));
        let b = queue.enqueue(OperationKind::Create, "b", json!(2), at(1));
        let c = queue.enqueue(OperationKind::Create, "c", json!(3), at(2));
        queue.get_mut(a).unwrap().status = OperationStatus::Succeeded;

        assert_eq!(queue.remove_succeeded(), 1);
        assert!(queue.get(a).is_none());

        let removed = queue.remove(b).unwrap();
        assert_eq!(removed.id, b);
        assert!(queue.remove(b).is_none());
        assert_eq!(queue.query(None)[0].id, c);
    }

    #[test]
    fn counts_and_clear() {
        let mut queue = OperationQueue::new();
        let a = queue.enqueue(OperationKind::Create, "a", json!(1), at(0));
        queue.enqueue(OperationKind::Create, "b", json!(2), at(1));
        queue.get_mut(a).unwrap().record_failure("boom", None);

        let counts = queue.counts();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.failed, 1);

        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn restore_keeps_later_operations() {
        let mut queue = OperationQueue::new();
        let a = queue.enqueue(OperationKind::Create, "a", json!(1), at(0));
        let b = queue.enqueue(OperationKind::Create, "b", json!(2), at(1));
        let snapshot = queue.clone();

        queue.get_mut(a).unwrap().status = OperationStatus::Succeeded;
        queue.remove(b);
        let c = queue.enqueue(OperationKind::Create, "c", json!(3), at(2));

        queue.restore(snapshot);
        let ids: Vec<_> = queue.iter().map(|op| op.id).collect();
        assert_eq!(ids, vec![a, b, c]);
        assert_eq!(queue.get(a).unwrap().status, OperationStatus::Pending);
    }

    #[test]
    fn restore_after_clear_brings_nothing_back() {
        let mut queue = OperationQueue::new();
        queue.enqueue(OperationKind::Create, "a", json!(1), at(0));
        let snapshot = queue.clone();

        queue.clear();
        let c = queue.enqueue(OperationKind::Create, "c", json!(3), at(2));

        queue.restore(snapshot);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.as_slice()[0].id, c);
    }
}
