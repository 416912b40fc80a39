//! Inspect command implementation.

use super::{open_engine, CliEngine, CliResult};
use offsync_protocol::{QueuedOperation, SyncConflict, Timestamp};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Aggregate engine status.
    pub sync_status: String,
    /// Completion time of the last completed pass.
    pub last_sync_time: Option<Timestamp>,
    /// Per-status operation counts.
    pub counts: StatusCounts,
    /// Queued operations, filtered by resource if requested.
    pub operations: Vec<QueuedOperation>,
    /// Unresolved conflicts.
    pub conflicts: Vec<SyncConflict>,
}

/// Operation counts by status.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    /// Total queued operations.
    pub total: usize,
    /// Pending operations.
    pub pending: usize,
    /// Failed operations.
    pub failed: usize,
    /// Dead-lettered operations.
    pub dead_letter: usize,
    /// Unresolved conflicts.
    pub conflicts: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str, resource: Option<&str>) -> CliResult<()> {
    let engine = open_engine(path, "", false)?;
    let result = collect(&engine, path, resource);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print!("{}", render_text(&result));
        }
    }

    Ok(())
}

/// Gathers the inspection result from an open engine.
pub fn collect(engine: &CliEngine, path: &Path, resource: Option<&str>) -> InspectResult {
    let state = engine.state();
    let counts = state.counts();

    InspectResult {
        path: path.display().to_string(),
        sync_status: state.sync_status.to_string(),
        last_sync_time: state.last_sync_time,
        counts: StatusCounts {
            total: state.queue.len(),
            pending: counts.pending,
            failed: counts.failed,
            dead_letter: counts.dead_letter,
            conflicts: state.conflicts.len(),
        },
        operations: engine.get_queued_operations(resource),
        conflicts: state.conflicts,
    }
}

/// Renders the human-readable report.
pub fn render_text(result: &InspectResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Offsync Store Inspection");
    let _ = writeln!(out, "========================");
    let _ = writeln!(out);
    let _ = writeln!(out, "Path:      {}", result.path);
    let _ = writeln!(out, "Status:    {}", result.sync_status);
    let last_sync = result
        .last_sync_time
        .map_or_else(|| "never".to_string(), |t| t.to_rfc3339());
    let _ = writeln!(out, "Last sync: {last_sync}");
    let _ = writeln!(out);
    let _ = writeln!(out, "Queue:");
    let _ = writeln!(out, "  Total:       {}", result.counts.total);
    let _ = writeln!(out, "  Pending:     {}", result.counts.pending);
    let _ = writeln!(out, "  Failed:      {}", result.counts.failed);
    let _ = writeln!(out, "  Dead-letter: {}", result.counts.dead_letter);
    let _ = writeln!(out, "  Conflicts:   {}", result.counts.conflicts);

    if !result.operations.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Operations:");
        for op in &result.operations {
            let _ = write!(
                out,
                "  {} {:?} {} {} retries={}",
                op.id, op.status, op.kind, op.resource, op.retry_count
            );
            if let Some(error) = &op.last_error {
                let _ = write!(out, " error={error:?}");
            }
            let _ = writeln!(out);
        }
    }

    if !result.conflicts.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Conflicts:");
        for conflict in &result.conflicts {
            let _ = writeln!(
                out,
                "  {} {} {} detected={}",
                conflict.id,
                conflict.operation.kind,
                conflict.operation.resource,
                conflict.detected_at.to_rfc3339()
            );
            let _ = writeln!(out, "    client: {}", conflict.client_data);
            let _ = writeln!(out, "    server: {}", conflict.server_data);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use offsync_protocol::OperationKind;
    use serde_json::json;

    #[test]
    fn collects_and_renders_queue() {
        let dir = tempfile::tempdir().unwrap();
        let engine = open_engine(dir.path(), "", false).unwrap();
        engine.enqueue_operation(OperationKind::Create, "case/1", json!({"title": "A"}));
        engine.enqueue_operation(OperationKind::Update, "invoice/9", json!({"total": 400}));

        let all = collect(&engine, dir.path(), None);
        assert_eq!(all.counts.total, 2);
        assert_eq!(all.counts.pending, 2);
        assert_eq!(all.sync_status, "idle");

        let filtered = collect(&engine, dir.path(), Some("invoice/9"));
        assert_eq!(filtered.operations.len(), 1);
        assert_eq!(filtered.counts.total, 2);

        let text = render_text(&all);
        assert!(text.contains("Last sync: never"));
        assert!(text.contains("case/1"));
        assert!(text.contains("Pending:     2"));
    }

    #[test]
    fn json_uses_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let engine = open_engine(dir.path(), "", false).unwrap();
        let result = collect(&engine, dir.path(), None);

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["syncStatus"], "idle");
        assert_eq!(value["counts"]["deadLetter"], 0);
        assert!(value["lastSyncTime"].is_null());
    }
}
