//! Filesystem seam used by planning, preview and apply
//!
//! Everything that touches workspace files goes through [`WorkspaceFs`] so the
//! applier can be exercised against failure-injecting implementations.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

#[async_trait]
pub trait WorkspaceFs: Send + Sync {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let bytes = self.read(path).await?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Replace `path` as a whole: no reader ever observes a partial write.
    async fn write_atomic(&self, path: &Path, content: &[u8]) -> io::Result<()>;

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    async fn remove_file(&self, path: &Path) -> io::Result<()>;

    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Remove an empty directory.
    async fn remove_dir(&self, path: &Path) -> io::Result<()>;

    async fn exists(&self, path: &Path) -> bool;

    async fn is_dir(&self, path: &Path) -> bool;

    /// True when `path` itself is a symbolic link, whatever it points at.
    async fn is_symlink(&self, path: &Path) -> bool;
}

/// Local filesystem through `tokio::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }

    /// Sibling used for the write-then-rename dance.
    fn temp_path(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        path.with_file_name(format!(".{}.refit-tmp-{}", name, Uuid::new_v4().simple()))
    }
}

#[async_trait]
impl WorkspaceFs for LocalFs {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn write_atomic(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        let temp = Self::temp_path(path);
        if let Err(e) = tokio::fs::write(&temp, content).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e);
        }

        // Keep the original permissions when replacing an existing file
        if let Ok(metadata) = tokio::fs::metadata(path).await {
            let _ = tokio::fs::set_permissions(&temp, metadata.permissions()).await;
        }

        if let Err(e) = tokio::fs::rename(&temp, path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e);
        }

        debug!(file_path = %path.display(), bytes = content.len(), "Wrote file atomically");
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        tokio::fs::rename(from, to).await
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_file(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn remove_dir(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_dir(path).await
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn is_dir(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    async fn is_symlink(&self, path: &Path) -> bool {
        tokio::fs::symlink_metadata(path)
            .await
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
    }
}
