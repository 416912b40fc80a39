//! Resolve command implementation.

use super::{open_engine, CliError, CliResult};
use offsync_protocol::{ConflictId, OperationId, ResolutionStrategy};
use serde_json::Value;
use std::path::Path;

/// Parsed arguments of the resolve command.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveArgs {
    /// Conflict to resolve.
    pub id: ConflictId,
    /// Resolution strategy.
    pub strategy: ResolutionStrategy,
    /// Caller-supplied merged payload.
    pub payload: Option<Value>,
}

impl ResolveArgs {
    /// Parses raw command-line values.
    pub fn parse(id: &str, strategy: &str, payload: Option<&str>) -> CliResult<Self> {
        let id = ConflictId::parse(id)
            .ok_or_else(|| CliError::InvalidArgument(format!("not a conflict id: {id}")))?;
        let strategy = ResolutionStrategy::from_name(strategy).ok_or_else(|| {
            CliError::InvalidArgument(format!(
                "unknown strategy '{strategy}' (expected client, server or merge)"
            ))
        })?;
        let payload = payload.map(serde_json::from_str).transpose()?;

        if payload.is_some() && strategy != ResolutionStrategy::Merge {
            return Err(CliError::InvalidArgument(
                "--payload is only used with the merge strategy".into(),
            ));
        }

        Ok(Self {
            id,
            strategy,
            payload,
        })
    }
}

/// Runs the resolve command.
pub fn run(path: &Path, id: &str, strategy: &str, payload: Option<&str>) -> CliResult<()> {
    let args = ResolveArgs::parse(id, strategy, payload)?;
    let op_id = resolve(path, args)?;
    println!("conflict {id} resolved; enqueued operation {op_id}");
    Ok(())
}

fn resolve(path: &Path, args: ResolveArgs) -> CliResult<OperationId> {
    let engine = open_engine(path, "", false)?;
    Ok(engine.resolve_conflict(args.id, args.strategy, args.payload)?)
}
