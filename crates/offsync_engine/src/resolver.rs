//! Unresolved conflict set.

use offsync_protocol::{shallow_merge, ConflictId, ResolutionStrategy, SyncConflict};
use serde_json::Value;

/// Holds conflicts awaiting an explicit decision, in detection order.
///
/// Conflicts are never resolved automatically. Each resolution produces the
/// payload of exactly one new operation; enqueuing it is the engine's job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConflictResolver {
    conflicts: Vec<SyncConflict>,
}

impl ConflictResolver {
    /// Creates an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver from persisted conflicts.
    pub fn from_conflicts(conflicts: Vec<SyncConflict>) -> Self {
        Self { conflicts }
    }

    /// Parks a new conflict.
    pub fn add(&mut self, conflict: SyncConflict) {
        self.conflicts.push(conflict);
    }

    /// Returns the conflict with the given ID.
    pub fn get(&self, id: ConflictId) -> Option<&SyncConflict> {
        self.conflicts.iter().find(|c| c.id == id)
    }

    /// Removes and returns the conflict with the given ID.
    pub fn remove(&mut self, id: ConflictId) -> Option<SyncConflict> {
        let index = self.conflicts.iter().position(|c| c.id == id)?;
        Some(self.conflicts.remove(index))
    }

    /// Keeps only the conflicts for which `keep` returns true.
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&SyncConflict) -> bool,
    {
        self.conflicts.retain(keep);
    }

    /// Returns all conflicts in detection order.
    pub fn list(&self) -> &[SyncConflict] {
        &self.conflicts
    }

    /// Returns the number of unresolved conflicts.
    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    /// Returns true if no conflict is pending.
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Computes the payload a resolution re-enqueues.
    ///
    /// `merged` is only consulted for [`ResolutionStrategy::Merge`]; without
    /// it the server state is shallow-merged with the client payload, client
    /// fields winning.
    pub fn resolve_payload(
        conflict: &SyncConflict,
        strategy: ResolutionStrategy,
        merged: Option<Value>,
    ) -> Value {
        match strategy {
            ResolutionStrategy::AcceptClient => conflict.client_data.clone(),
            ResolutionStrategy::AcceptServer => conflict.server_data.clone(),
            ResolutionStrategy::Merge => merged
                .unwrap_or_else(|| shallow_merge(&conflict.server_data, &conflict.client_data)),
        }
    }
}
