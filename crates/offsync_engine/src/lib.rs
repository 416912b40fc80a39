//! # Offsync Engine
//!
//! Offline-tolerant mutation queue and sync driver.
//!
//! This crate provides:
//! - A durable, ordered queue of mutations recorded while offline
//! - A drain pass that delivers queued mutations one at a time
//! - Conflict capture and explicit resolution
//! - Retry with exponential backoff and a dead-letter ceiling
//! - A scheduler draining on a timer and on reconnect
//! - HTTP transport abstraction
//!
//! ## Architecture
//!
//! The host application owns one [`SyncEngine`] and hands it a
//! [`SyncTransport`], a [`DurableStore`](offsync_storage::DurableStore), a
//! [`Clock`] and a [`ConnectivityMonitor`]. Mutations are enqueued locally
//! and persisted immediately; [`SyncEngine::drain`] reconciles them with the
//! server when online.
//!
//! ## Key Invariants
//!
//! - Operations are delivered in enqueue order
//! - At most one drain pass runs at a time
//! - Conflicts are never resolved automatically
//! - Every state change is written through to the durable store

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod command;
mod config;
mod connectivity;
mod engine;
mod error;
mod http;
mod queue;
mod resolver;
mod scheduler;
mod state;
mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{Command, Mutation};
pub use config::{RetryConfig, SyncConfig};
pub use connectivity::ConnectivityMonitor;
pub use engine::{SyncEngine, CONFLICTS_KEY, LAST_SYNC_KEY, QUEUE_KEY};
pub use error::{SyncError, SyncResult};
#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
pub use http::{HttpClient, HttpResponse, HttpTransport, IDEMPOTENCY_HEADER};
pub use queue::OperationQueue;
pub use resolver::ConflictResolver;
pub use scheduler::{Scheduler, SchedulerHandle};
pub use state::{DrainOutcome, DrainReport, EngineState, SkipReason, SyncStatus};
pub use transport::{DeliveryOutcome, MockReply, MockTransport, SyncTransport};
