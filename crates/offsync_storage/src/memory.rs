//! In-memory store for testing.

use crate::error::{StoreError, StoreResult};
use crate::store::{validate_key, DurableStore};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// An in-memory key-value store.
///
/// This store keeps all values in memory and is suitable for:
/// - Unit tests
/// - Integration tests that simulate a reload by building a second engine
///   over the same `Arc<InMemoryStore>`
/// - Sessions that don't need persistence
///
/// # Example
///
/// ```rust
/// use offsync_storage::{DurableStore, InMemoryStore};
///
/// let store = InMemoryStore::new();
/// store.put("offline_queue", "[]").unwrap();
/// assert_eq!(store.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    values: RwLock<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with pre-existing values.
    ///
    /// Useful for testing startup recovery.
    #[must_use]
    pub fn with_values<K, V>(values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: RwLock::new(
                values
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent `put` and `remove` fail with an I/O error.
    ///
    /// Useful for testing how callers degrade when persistence is lost.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Returns true if no key is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("writes disabled")));
        }
        Ok(())
    }
}

impl DurableStore for InMemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        validate_key(key)?;
        Ok(self.values.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        validate_key(key)?;
        self.check_writable()?;
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        validate_key(key)?;
        self.check_writable()?;
        self.values.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get("offline_queue").unwrap(), None);
    }

    #[test]
    fn memory_put_replaces_value() {
        let store = InMemoryStore::new();
        store.put("offline_queue", "[1]").unwrap();
        store.put("offline_queue", "[1,2]").unwrap();

        assert_eq!(store.get("offline_queue").unwrap().as_deref(), Some("[1,2]"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn memory_remove_absent_key() {
        let store = InMemoryStore::new();
        assert!(store.remove("missing").is_ok());
    }

    #[test]
    fn memory_with_values() {
        let store = InMemoryStore::with_values([("offline_last_sync", "2024-01-01T00:00:00Z")]);
        assert_eq!(
            store.get("offline_last_sync").unwrap().as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
    }

    #[test]
    fn memory_fail_writes_keeps_previous_value() {
        let store = InMemoryStore::new();
        store.put("offline_queue", "[]").unwrap();

        store.set_fail_writes(true);
        assert!(matches!(
            store.put("offline_queue", "[1]"),
            Err(StoreError::Io(_))
        ));
        assert!(store.remove("offline_queue").is_err());
        assert_eq!(store.get("offline_queue").unwrap().as_deref(), Some("[]"));

        store.set_fail_writes(false);
        store.put("offline_queue", "[1]").unwrap();
        assert_eq!(store.get("offline_queue").unwrap().as_deref(), Some("[1]"));
    }

    #[test]
    fn memory_rejects_invalid_key() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.put("bad/key", "x"),
            Err(StoreError::InvalidKey(_))
        ));
    }
}
