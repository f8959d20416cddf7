//! Pre-write snapshots used for rollback

use super::workspace_fs::WorkspaceFs;
use refit_foundation::{RefitError, RefitResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What a path held before the apply touched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotState {
    Content(Vec<u8>),
    /// The path did not exist; rollback removes it
    Absent,
}

/// In-memory snapshots, one per touched path.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    entries: HashMap<PathBuf, SnapshotState>,
    order: Vec<PathBuf>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current state of every path. The first capture of a path wins.
    pub async fn capture(&mut self, fs: &dyn WorkspaceFs, paths: &[PathBuf]) -> RefitResult<()> {
        for path in paths {
            if self.entries.contains_key(path) {
                continue;
            }
            let state = match fs.read(path).await {
                Ok(content) => SnapshotState::Content(content),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => SnapshotState::Absent,
                Err(e) => return Err(RefitError::io_at(path, e)),
            };
            self.entries.insert(path.to_path_buf(), state);
            self.order.push(path.to_path_buf());
        }
        debug!(snapshot_count = self.entries.len(), "Created file snapshots");
        Ok(())
    }

    pub fn get(&self, path: &Path) -> Option<&SnapshotState> {
        self.entries.get(path)
    }

    /// Paths in capture order
    pub fn paths(&self) -> &[PathBuf] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
