//! File-level locking to prevent concurrent modifications
//!
//! Applies take exclusive locks on every path they touch, in sorted order, so
//! two applies with overlapping paths serialise instead of interleaving and
//! cannot deadlock. Non-overlapping applies proceed in parallel.

use refit_foundation::{RefitError, RefitResult};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tokio::time::Instant;
use tracing::debug;

/// Guards held for the duration of one apply. Dropping releases every lock.
#[derive(Debug)]
pub struct LockSet {
    paths: Vec<PathBuf>,
    _guards: Vec<OwnedRwLockWriteGuard<()>>,
}

impl LockSet {
    /// Locked paths in acquisition order
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

/// Manages file-level locks for concurrent operations
#[derive(Debug, Default)]
pub struct LockManager {
    /// Map of canonical file paths to their associated locks
    locks: RwLock<HashMap<PathBuf, Arc<RwLock<()>>>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the lock for a file
    pub async fn get_lock(&self, path: &Path) -> Arc<RwLock<()>> {
        let key = canonical_key(path).await;
        self.lock_for_key(key).await
    }

    async fn lock_for_key(&self, key: PathBuf) -> Arc<RwLock<()>> {
        let mut locks = self.locks.write().await;
        locks
            .entry(key)
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Acquire exclusive locks on all `paths` within `timeout`.
    ///
    /// Paths are canonicalised and deduplicated first, then locked in sorted
    /// order. On timeout every lock acquired so far is released and a `Busy`
    /// error names the path that could not be locked.
    pub async fn acquire_all(&self, paths: &[PathBuf], timeout: Duration) -> RefitResult<LockSet> {
        let start = Instant::now();
        let deadline = start + timeout;

        let mut keys = BTreeSet::new();
        for path in paths {
            keys.insert(canonical_key(path).await);
        }

        let mut guards = Vec::with_capacity(keys.len());
        let mut locked = Vec::with_capacity(keys.len());
        for key in keys {
            let lock = self.lock_for_key(key.clone()).await;
            match tokio::time::timeout_at(deadline, lock.write_owned()).await {
                Ok(guard) => {
                    guards.push(guard);
                    locked.push(key);
                }
                Err(_) => {
                    let waited_ms = start.elapsed().as_millis() as u64;
                    debug!(
                        file_path = %key.display(),
                        waited_ms,
                        "Timed out waiting for file lock"
                    );
                    return Err(RefitError::busy(key.display().to_string(), waited_ms));
                }
            }
        }

        debug!(lock_count = locked.len(), "Acquired file locks");
        Ok(LockSet {
            paths: locked,
            _guards: guards,
        })
    }

    /// Check if a file is currently locked
    pub async fn is_locked(&self, path: &Path) -> bool {
        let key = canonical_key(path).await;
        let locks = self.locks.read().await;
        match locks.get(&key) {
            Some(lock) => lock.try_write().is_err(),
            None => false,
        }
    }

    /// Remove locks nobody holds
    pub async fn cleanup_unused_locks(&self) {
        let mut locks = self.locks.write().await;
        locks.retain(|_path, lock| Arc::strong_count(lock) > 1);
    }

    /// Get the number of tracked locks
    pub async fn lock_count(&self) -> usize {
        self.locks.read().await.len()
    }
}

/// Canonical form of a path that may not exist yet: the nearest existing
/// ancestor is canonicalised and the missing tail re-attached.
async fn canonical_key(path: &Path) -> PathBuf {
    let mut tail = Vec::new();
    let mut current = path;
    loop {
        if let Ok(canonical) = tokio::fs::canonicalize(current).await {
            let mut key = canonical;
            for part in tail.iter().rev() {
                key.push(part);
            }
            return key;
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                current = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_lock_is_exclusive() {
        let manager = LockManager::new();
        let path = Path::new("/test/file.txt");

        let lock = manager.get_lock(path).await;
        let _guard = lock.write().await;

        assert!(manager.is_locked(path).await);
        assert!(lock.try_write().is_err());
    }

    #[tokio::test]
    async fn test_acquire_all_times_out_with_busy() {
        let manager = LockManager::new();
        let path = PathBuf::from("/test/busy.txt");
        let paths = [path.clone()];

        let held = manager
            .acquire_all(&paths, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(held.paths().len(), 1);

        let err = manager
            .acquire_all(&paths, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, RefitError::Busy { .. }));

        drop(held);
        assert!(manager
            .acquire_all(&paths, Duration::from_millis(50))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_failed_acquire_releases_partial_locks() {
        let manager = LockManager::new();
        let a = PathBuf::from("/test/a.txt");
        let b = PathBuf::from("/test/b.txt");

        let held_b = manager
            .acquire_all(&[b.clone()], Duration::from_millis(100))
            .await
            .unwrap();
        assert!(manager
            .acquire_all(&[a.clone(), b], Duration::from_millis(50))
            .await
            .is_err());
        assert!(!manager.is_locked(&a).await);
        drop(held_b);
    }

    #[tokio::test]
    async fn test_missing_paths_share_key_with_existing_ancestor() {
        let dir = TempDir::new().unwrap();
        let manager = LockManager::new();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let via_parent = dir.path().join("sub").join("..").join("new.ts");
        let direct = dir.path().join("new.ts");

        let held = manager
            .acquire_all(&[direct], Duration::from_millis(100))
            .await
            .unwrap();
        assert!(manager.is_locked(&via_parent).await);
        assert_eq!(manager.lock_count().await, 1);
        drop(held);
    }

    #[tokio::test]
    async fn test_cleanup_unused_locks() {
        let manager = LockManager::new();
        {
            let _set = manager
                .acquire_all(&[PathBuf::from("/test/x.txt")], Duration::from_millis(50))
                .await
                .unwrap();
            manager.cleanup_unused_locks().await;
            assert_eq!(manager.lock_count().await, 1);
        }
        manager.cleanup_unused_locks().await;
        assert_eq!(manager.lock_count().await, 0);
    }
}
