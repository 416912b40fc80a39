//! Queue maintenance commands.

use super::{open_engine, CliResult};
use std::path::Path;

/// Moves every failed operation back to pending.
pub fn retry_failed(path: &Path) -> CliResult<()> {
    let engine = open_engine(path, "", false)?;
    let moved = engine.retry_failed();
    println!("{moved} failed operation(s) marked for retry");
    Ok(())
}

/// Moves every dead-lettered operation back to pending.
pub fn requeue_dead(path: &Path) -> CliResult<()> {
    let engine = open_engine(path, "", false)?;
    let moved = engine.requeue_dead_letters();
    println!("{moved} dead-lettered operation(s) requeued");
    Ok(())
}

/// Drops every queued operation. Does nothing unless `confirmed`.
pub fn clear(path: &Path, confirmed: bool) -> CliResult<()> {
    let engine = open_engine(path, "", false)?;
    let queued = engine.queue().len();

    if !confirmed {
        println!("{queued} operation(s) would be dropped; pass --yes to confirm");
        return Ok(());
    }

    engine.clear_queue();
    println!("{queued} operation(s) dropped");
    Ok(())
}
