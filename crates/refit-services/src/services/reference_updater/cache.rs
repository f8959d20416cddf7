//! Import cache for reference updater
//!
//! Caches parsed references per file, keyed by path and a SHA-256 content
//! fingerprint, so unchanged files are not re-parsed between plans. A reverse
//! index answers "which files reference this path?" for cached entries.
//!
//! Entries are dropped as soon as an apply touches their file; a fingerprint
//! mismatch on lookup also counts as a miss.

use refit_plugin_api::ImportRef;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// Cached parse result for one file
#[derive(Debug, Clone)]
pub struct FileImportInfo {
    pub fingerprint: String,
    pub refs: Vec<ImportRef>,
    /// Resolved targets of `refs`, used for the reverse index
    pub targets: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
struct Indexes {
    forward: HashMap<PathBuf, FileImportInfo>,
    reverse: HashMap<PathBuf, HashSet<PathBuf>>,
}

/// Thread-safe import cache with reverse index.
///
/// Both indexes sit behind one `RwLock` so they never disagree.
#[derive(Debug)]
pub struct ImportCache {
    enabled: bool,
    indexes: RwLock<Indexes>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ImportCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            indexes: RwLock::new(Indexes::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cached refs for `file` if its content still has `fingerprint`
    pub async fn get(&self, file: &Path, fingerprint: &str) -> Option<Vec<ImportRef>> {
        if !self.enabled {
            return None;
        }
        let indexes = self.indexes.read().await;
        match indexes.forward.get(file) {
            Some(info) if info.fingerprint == fingerprint => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(info.refs.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store refs for a file and update the reverse index
    pub async fn insert(&self, file: PathBuf, info: FileImportInfo) {
        if !self.enabled {
            return;
        }
        let mut indexes = self.indexes.write().await;
        Self::remove_reverse(&mut indexes, &file);
        for target in &info.targets {
            indexes
                .reverse
                .entry(target.clone())
                .or_default()
                .insert(file.clone());
        }
        indexes.forward.insert(file, info);
    }

    /// Cached files referencing `target`, sorted
    pub async fn importers_of(&self, target: &Path) -> Vec<PathBuf> {
        let indexes = self.indexes.read().await;
        let importers: BTreeSet<PathBuf> = indexes
            .reverse
            .get(target)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        importers.into_iter().collect()
    }

    /// Drop the entries for `paths`, and the reverse links pointing at them.
    pub async fn invalidate(&self, paths: &[PathBuf]) {
        let mut indexes = self.indexes.write().await;
        let mut removed = 0usize;
        for path in paths {
            Self::remove_reverse(&mut indexes, path);
            if indexes.forward.remove(path).is_some() {
                removed += 1;
            }
            indexes.reverse.remove(path);
        }
        if removed > 0 {
            debug!(removed, "Invalidated import cache entries");
        }
    }

    pub async fn clear(&self) {
        let mut indexes = self.indexes.write().await;
        indexes.forward.clear();
        indexes.reverse.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.indexes.read().await.forward.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn remove_reverse(indexes: &mut Indexes, file: &Path) {
        if let Some(old) = indexes.forward.get(file) {
            let targets = old.targets.clone();
            for target in targets {
                if let Some(importers) = indexes.reverse.get_mut(&target) {
                    importers.remove(file);
                    if importers.is_empty() {
                        indexes.reverse.remove(&target);
                    }
                }
            }
        }
    }
}

impl Default for ImportCache {
    fn default() -> Self {
        Self::new(true)
    }
}
