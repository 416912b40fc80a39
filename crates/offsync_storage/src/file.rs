//! File-based store for persistent sessions.
//!
//! Layout of a store directory:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK                 # Advisory lock, one owner per directory
//! ├─ offline_queue        # One file per key
//! ├─ offline_conflicts
//! └─ offline_last_sync
//! ```

use crate::error::{StoreError, StoreResult};
use crate::store::{validate_key, DurableStore, LOCK_FILE};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const TEMP_SUFFIX: &str = ".tmp";

/// A store that keeps each key in its own file.
///
/// # Durability
///
/// `put` writes the value to `<key>.tmp`, calls `sync_all`, then renames it
/// over `<key>`. A crash mid-write leaves the previous value in place.
///
/// # Ownership
///
/// The store holds an exclusive advisory lock on `LOCK` for as long as it is
/// alive. A second `open` of the same directory fails with
/// [`StoreError::Locked`] until the first store is dropped.
///
/// # Example
///
/// ```no_run
/// use offsync_storage::{DurableStore, FileStore};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("offsync-data")).unwrap();
/// store.put("offline_queue", "[]").unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// Serializes writers within the process; the lock file covers others.
    write_lock: Mutex<()>,
    _lock_file: File,
}

impl FileStore {
    /// Opens or creates a store directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path exists and is not a directory
    /// - Another process holds the lock (returns `Locked`)
    /// - I/O errors occur
    pub fn open(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(StoreError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("store path is not a directory: {}", path.display()),
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked(path.display().to_string()));
        }

        Ok(Self {
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.path.join(key)
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.path.join(format!("{key}{TEMP_SUFFIX}"))
    }
}

impl DurableStore for FileStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        validate_key(key)?;
        match fs::read(self.key_path(key)) {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| StoreError::Corrupted(format!("value of {key} is not UTF-8"))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        validate_key(key)?;
        let _guard = self.write_lock.lock();

        let temp_path = self.temp_path(key);
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, self.key_path(key))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        validate_key(key)?;
        let _guard = self.write_lock.lock();

        match fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_open_creates_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("store");

        let store = FileStore::open(&path).unwrap();
        assert!(path.is_dir());
        assert_eq!(store.path(), path.as_path());
    }

    #[test]
    fn file_put_get_remove() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        assert_eq!(store.get("offline_queue").unwrap(), None);

        store.put("offline_queue", "[\"a\"]").unwrap();
        assert_eq!(
            store.get("offline_queue").unwrap().as_deref(),
            Some("[\"a\"]")
        );

        store.remove("offline_queue").unwrap();
        assert_eq!(store.get("offline_queue").unwrap(), None);
        assert!(store.remove("offline_queue").is_ok());
    }

    #[test]
    fn file_put_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.put("offline_last_sync", "2024-01-01T00:00:00Z").unwrap();

        assert!(!dir.path().join("offline_last_sync.tmp").exists());
        assert!(dir.path().join("offline_last_sync").exists());
    }

    #[test]
    fn file_values_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            store.put("offline_conflicts", "[]").unwrap();
        }

        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(
            store.get("offline_conflicts").unwrap().as_deref(),
            Some("[]")
        );
    }

    #[test]
    fn file_lock_prevents_second_open() {
        let dir = tempdir().unwrap();
        let _store = FileStore::open(dir.path()).unwrap();

        let second = FileStore::open(dir.path());
        assert!(matches!(second, Err(StoreError::Locked(_))));
    }

    #[test]
    fn file_lock_released_on_drop() {
        let dir = tempdir().unwrap();
        {
            let _store = FileStore::open(dir.path()).unwrap();
        }
        assert!(FileStore::open(dir.path()).is_ok());
    }

    #[test]
    fn file_rejects_path_traversal() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.put("../escape", "x"),
            Err(StoreError::InvalidKey(_))
        ));
    }

    #[test]
    fn file_put_cannot_replace_lock_file() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.put("LOCK", "x"),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(store.remove("LOCK").is_err());

        let second = FileStore::open(dir.path());
        assert!(matches!(second, Err(StoreError::Locked(_))));
    }

    #[test]
    fn file_open_on_regular_file_fails() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("plain");
        fs::write(&file_path, b"x").unwrap();

        assert!(FileStore::open(&file_path).is_err());
    }
}
