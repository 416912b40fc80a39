//! # Offsync Storage
//!
//! Durable key-value store trait and implementations for offsync.
//!
//! The engine uses a store as the write-ahead record of its own
//! bookkeeping: the serialized queue, the serialized conflict list and the
//! last sync timestamp. Stores are **opaque string stores** - they do not
//! interpret the values they hold.
//!
//! ## Design Principles
//!
//! - Every `put` is durable once it returns
//! - Values are replaced atomically, never partially written
//! - Must be `Send + Sync` for shared access
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral sessions
//! - [`FileStore`] - One file per key in a locked directory
//!
//! ## Example
//!
//! ```rust
//! use offsync_storage::{DurableStore, InMemoryStore};
//!
//! let store = InMemoryStore::new();
//! store.put("offline_last_sync", "2024-03-01T10:00:00Z").unwrap();
//! assert_eq!(
//!     store.get("offline_last_sync").unwrap().as_deref(),
//!     Some("2024-03-01T10:00:00Z")
//! );
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use store::{validate_key, DurableStore};
