//! Sync command implementation.

use super::{open_engine, CliError, CliResult};
use offsync_engine::DrainOutcome;
use std::path::Path;

/// Runs one drain pass against `endpoint` and prints the report.
pub fn run(path: &Path, endpoint: &str) -> CliResult<()> {
    if endpoint.is_empty() {
        return Err(CliError::InvalidArgument("endpoint must not be empty".into()));
    }

    let engine = open_engine(path, endpoint, true)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(engine.drain());

    println!("Sync {report}");
    println!("Status:    {}", engine.sync_status());
    println!("Remaining: {}", engine.queue().len());
    println!("Conflicts: {}", engine.conflicts().len());

    match report.outcome {
        DrainOutcome::Aborted(message) => Err(CliError::SyncAborted(message)),
        _ => Ok(()),
    }
}
