//! CLI command implementations.

pub mod inspect;
pub mod maintain;
pub mod resolve;
pub mod sync;

use offsync_engine::{
    ConnectivityMonitor, HttpTransport, ReqwestClient, SyncConfig, SyncEngine, SyncError,
    SystemClock,
};
use offsync_storage::{FileStore, StoreError};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Engine type the CLI operates on.
pub type CliEngine = SyncEngine<HttpTransport<ReqwestClient>, FileStore>;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by CLI commands.
#[derive(Error, Debug)]
pub enum CliError {
    /// A command-line argument could not be interpreted.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No store exists at the given path.
    #[error("no store found at {0}")]
    MissingStore(String),

    /// The drain pass was aborted.
    #[error("sync aborted: {0}")]
    SyncAborted(String),

    /// Engine error.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// JSON error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opens the engine over an existing store directory.
///
/// The engine starts offline unless `online` is set, so maintenance
/// commands never touch the network.
pub fn open_engine(store: &Path, endpoint: &str, online: bool) -> CliResult<CliEngine> {
    if !store.is_dir() {
        return Err(CliError::MissingStore(store.display().to_string()));
    }

    let config = SyncConfig::new(endpoint);
    let client = ReqwestClient::new(config.request_timeout)?;
    let transport = HttpTransport::new(endpoint, client);
    let store = FileStore::open(store)?;

    Ok(SyncEngine::open(
        config,
        Arc::new(transport),
        Arc::new(store),
        Arc::new(SystemClock),
        ConnectivityMonitor::new(online),
    ))
}
