//! Durable store trait definition.

use crate::error::{StoreError, StoreResult};

/// Name of the advisory lock file in a [`crate::FileStore`] directory.
pub(crate) const LOCK_FILE: &str = "LOCK";

/// A durable key-value store.
///
/// # Invariants
///
/// - `get` returns exactly the value of the last successful `put` for a key
/// - A successful `put` survives process termination (for persistent stores)
/// - `remove` of an absent key succeeds
/// - Implementations must be `Send + Sync`
pub trait DurableStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key has never been written or was removed.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Replaces the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the write fails. On error
    /// the previous value, if any, is left intact.
    fn put(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removes `key` from the store.
    fn remove(&self, key: &str) -> StoreResult<()>;
}

/// Checks that a key is non-empty, only uses `[A-Za-z0-9_-]` and is not
/// the lock file name (in any case).
///
/// Keys double as file names in [`crate::FileStore`], so every store
/// applies the same rule.
pub fn validate_key(key: &str) -> StoreResult<()> {
    let valid = !key.is_empty()
        && !key.eq_ignore_ascii_case(LOCK_FILE)
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_keys() {
        assert!(validate_key("offline_queue").is_ok());
        assert!(validate_key("offline-last-sync2").is_ok());
    }

    #[test]
    fn invalid_keys() {
        assert!(matches!(validate_key(""), Err(StoreError::InvalidKey(_))));
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("queue.json").is_err());
        assert!(validate_key("a b").is_err());
    }

    #[test]
    fn lock_file_name_is_reserved() {
        assert!(matches!(validate_key("LOCK"), Err(StoreError::InvalidKey(_))));
        assert!(validate_key("lock").is_err());
        assert!(validate_key("LOCKED").is_ok());
    }
}
