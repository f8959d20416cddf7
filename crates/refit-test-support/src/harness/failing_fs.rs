//! Filesystems that misbehave on purpose

use async_trait::async_trait;
use refit_services::{LocalFs, WorkspaceFs};
use std::io;
use refit_services::CancellationFlag;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Barrier;

/// Local filesystem whose Nth mutation (1-based) fails once.
///
/// Content writes and renames both count as mutations. After the injected
/// failure every call succeeds, so rollback can restore the workspace.
/// [`FailingFs::refuse_writes_to`] instead never lets anything be written to
/// one path, which makes restoring that path during rollback fail too.
pub struct FailingFs {
    inner: LocalFs,
    fail_on: usize,
    refused: Option<PathBuf>,
    mutations: AtomicUsize,
    fired: AtomicBool,
}

impl FailingFs {
    pub fn fail_on_write(n: usize) -> Self {
        Self {
            inner: LocalFs::new(),
            fail_on: n,
            refused: None,
            mutations: AtomicUsize::new(0),
            fired: AtomicBool::new(false),
        }
    }

    /// Every write or rename onto a path ending in `path` fails.
    pub fn refuse_writes_to(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: LocalFs::new(),
            fail_on: 0,
            refused: Some(path.into()),
            mutations: AtomicUsize::new(0),
            fired: AtomicBool::new(false),
        }
    }

    /// Mutations attempted so far, including the failed one.
    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    pub fn fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    fn check(&self, path: &Path) -> io::Result<()> {
        let n = self.mutations.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(refused) = &self.refused {
            if path.ends_with(refused) {
                self.fired.store(true, Ordering::SeqCst);
                return Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    format!("writes to {} are refused", path.display()),
                ));
            }
            return Ok(());
        }
        if n == self.fail_on && !self.fired.swap(true, Ordering::SeqCst) {
            return Err(io::Error::other(format!(
                "injected failure on write #{} ({})",
                n,
                path.display()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl WorkspaceFs for FailingFs {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn write_atomic(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        self.check(path)?;
        self.inner.write_atomic(path, content).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if self.refused.is_some() {
            self.check(to)?;
        } else {
            self.check(from)?;
        }
        self.inner.rename(from, to).await
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.inner.remove_file(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.inner.create_dir_all(path).await
    }

    async fn remove_dir(&self, path: &Path) -> io::Result<()> {
        self.inner.remove_dir(path).await
    }

    async fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path).await
    }

    async fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path).await
    }

    async fn is_symlink(&self, path: &Path) -> bool {
        self.inner.is_symlink(path).await
    }
}

/// Local filesystem whose first `parties` content writes wait for each other.
///
/// Two applies that must both reach `Writing` before either can finish only
/// complete if nothing serializes them.
pub struct BarrierFs {
    inner: LocalFs,
    parties: usize,
    arrived: AtomicUsize,
    barrier: Barrier,
}

impl BarrierFs {
    pub fn new(parties: usize) -> Self {
        Self {
            inner: LocalFs::new(),
            parties,
            arrived: AtomicUsize::new(0),
            barrier: Barrier::new(parties),
        }
    }
}

#[async_trait]
impl WorkspaceFs for BarrierFs {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn write_atomic(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        if self.arrived.fetch_add(1, Ordering::SeqCst) < self.parties {
            self.barrier.wait().await;
        }
        self.inner.write_atomic(path, content).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.inner.rename(from, to).await
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.inner.remove_file(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.inner.create_dir_all(path).await
    }

    async fn remove_dir(&self, path: &Path) -> io::Result<()> {
        self.inner.remove_dir(path).await
    }

    async fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path).await
    }

    async fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path).await
    }

    async fn is_symlink(&self, path: &Path) -> bool {
        self.inner.is_symlink(path).await
    }
}

/// Local filesystem that raises a cancellation flag once `after` content
/// writes or renames have gone through.
pub struct CancellingFs {
    inner: LocalFs,
    after: usize,
    cancel: CancellationFlag,
    mutations: AtomicUsize,
}

impl CancellingFs {
    pub fn new(after: usize, cancel: CancellationFlag) -> Self {
        Self {
            inner: LocalFs::new(),
            after,
            cancel,
            mutations: AtomicUsize::new(0),
        }
    }

    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn count(&self) {
        if self.mutations.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
            self.cancel.cancel();
        }
    }
}

#[async_trait]
impl WorkspaceFs for CancellingFs {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn write_atomic(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        self.inner.write_atomic(path, content).await?;
        self.count();
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.inner.rename(from, to).await?;
        self.count();
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.inner.remove_file(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.inner.create_dir_all(path).await
    }

    async fn remove_dir(&self, path: &Path) -> io::Result<()> {
        self.inner.remove_dir(path).await
    }

    async fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path).await
    }

    async fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path).await
    }

    async fn is_symlink(&self, path: &Path) -> bool {
        self.inner.is_symlink(path).await
    }
}
