//! Offsync CLI
//!
//! Command-line tools for inspecting and repairing offsync queue stores.
//!
//! # Commands
//!
//! - `inspect` - Display queued operations, conflicts and counts
//! - `retry-failed` - Make failed operations eligible again
//! - `requeue-dead` - Give dead-lettered operations a fresh retry budget
//! - `clear` - Drop every queued operation
//! - `resolve` - Resolve a conflict
//! - `sync` - Run one drain pass against an endpoint

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Offsync queue store tools.
#[derive(Parser)]
#[command(name = "offsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long, env = "OFFSYNC_STORE")]
    store: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display queued operations, conflicts and counts
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Only show operations for this resource
        #[arg(short, long)]
        resource: Option<String>,
    },

    /// Move failed operations back to pending
    RetryFailed,

    /// Move dead-lettered operations back to pending
    RequeueDead,

    /// Drop every queued operation
    Clear {
        /// Confirm the operation
        #[arg(long)]
        yes: bool,
    },

    /// Resolve a conflict
    Resolve {
        /// Conflict ID
        id: String,

        /// Strategy (client, server, merge)
        strategy: String,

        /// Merged payload as JSON (merge only)
        #[arg(short, long)]
        payload: Option<String>,
    },

    /// Run one drain pass against the sync endpoint
    Sync {
        /// Sync endpoint URL
        #[arg(short, long, env = "OFFSYNC_ENDPOINT")]
        endpoint: Option<String>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format, resource } => {
            let store = cli.store.ok_or("Store path required for inspect")?;
            commands::inspect::run(&store, &format, resource.as_deref())?;
        }
        Commands::RetryFailed => {
            let store = cli.store.ok_or("Store path required for retry-failed")?;
            commands::maintain::retry_failed(&store)?;
        }
        Commands::RequeueDead => {
            let store = cli.store.ok_or("Store path required for requeue-dead")?;
            commands::maintain::requeue_dead(&store)?;
        }
        Commands::Clear { yes } => {
            let store = cli.store.ok_or("Store path required for clear")?;
            commands::maintain::clear(&store, yes)?;
        }
        Commands::Resolve {
            id,
            strategy,
            payload,
        } => {
            let store = cli.store.ok_or("Store path required for resolve")?;
            commands::resolve::run(&store, &id, &strategy, payload.as_deref())?;
        }
        Commands::Sync { endpoint } => {
            let store = cli.store.ok_or("Store path required for sync")?;
            let endpoint = endpoint.ok_or("Endpoint required for sync")?;
            commands::sync::run(&store, &endpoint)?;
        }
        Commands::Version => {
            println!("Offsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
