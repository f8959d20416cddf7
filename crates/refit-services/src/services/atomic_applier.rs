//! Transactional plan application
//!
//! An apply walks `Validating -> Locking -> Snapshotting -> Writing ->
//! [Verifying] -> Committed -> Released`. Any failure from `Writing` onwards
//! restores every touched path from its snapshot (`RollingBack ->
//! RolledBack -> Released`). Failures before `Writing` return an error and
//! leave the workspace untouched.

use super::cancellation::CancellationFlag;
use super::checksum_validator::ChecksumValidator;
use super::edit_merger::EditMerger;
use super::lock_manager::LockManager;
use super::post_apply_validator::VerificationHook;
use super::reference_updater::ImportCache;
use super::snapshot::{SnapshotState, SnapshotStore};
use super::workspace_fs::WorkspaceFs;
use refit_foundation::{
    ApplyResult, ApplyState, DeleteTarget, ErrorResponse, FileOperation, Plan, RefactorOperation,
    RefitError, RefitResult, RestoreFailure,
};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

pub struct AtomicApplier {
    project_root: PathBuf,
    fs: Arc<dyn WorkspaceFs>,
    locks: Arc<LockManager>,
    cache: Arc<ImportCache>,
    lock_timeout: Duration,
    verification: Option<Arc<dyn VerificationHook>>,
}

/// One mutation, as rollback has to undo it.
#[derive(Debug)]
enum Written {
    /// Content replaced or file removed at this path
    Path(PathBuf),
    Move { from: PathBuf, to: PathBuf },
}

/// A directory vacated by the apply, and where its counterpart now lives.
#[derive(Debug, Clone)]
struct SourceDir {
    path: PathBuf,
    destination: Option<PathBuf>,
}

/// Bookkeeping for one apply.
struct Transaction {
    result: ApplyResult,
    started: Instant,
    /// Mutations so far, in order. Rollback walks this backwards.
    write_log: Vec<Written>,
    /// Directories created for move or create destinations.
    created_dirs: Vec<PathBuf>,
    /// Emptied source directories removed after writing.
    removed_dirs: Vec<PathBuf>,
}

impl Transaction {
    fn new(plan: &Plan) -> Self {
        Self {
            result: ApplyResult::new(plan.id),
            started: Instant::now(),
            write_log: Vec::new(),
            created_dirs: Vec::new(),
            removed_dirs: Vec::new(),
        }
    }

    fn enter(&mut self, state: ApplyState) {
        debug!(plan_id = %self.result.plan_id, state = %state, "Apply state");
        self.result.state_history.push(state);
        self.result.final_state = state;
    }

    fn finish(mut self) -> ApplyResult {
        self.result.duration_ms = self.started.elapsed().as_millis() as u64;
        self.result
    }
}

impl AtomicApplier {
    pub fn new(
        project_root: impl Into<PathBuf>,
        fs: Arc<dyn WorkspaceFs>,
        locks: Arc<LockManager>,
        cache: Arc<ImportCache>,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            fs,
            locks,
            cache,
            lock_timeout,
            verification: None,
        }
    }

    /// Run `hook` after writing; a failing hook rolls the apply back.
    pub fn with_verification(mut self, hook: Arc<dyn VerificationHook>) -> Self {
        self.verification = Some(hook);
        self
    }

    /// Apply `plan` all-or-nothing.
    ///
    /// # Errors
    ///
    /// Returns `Err` only for failures before anything was written: stale
    /// checksums, missing sources, occupied destinations, lock timeouts and
    /// cancellation. Later failures are reported through the returned
    /// [`ApplyResult`] after rollback.
    pub async fn apply(&self, plan: &Plan, cancel: &CancellationFlag) -> RefitResult<ApplyResult> {
        let mut tx = Transaction::new(plan);
        info!(
            plan_id = %plan.id,
            operation = plan.operation.label(),
            edits = plan.edit.edit_count(),
            file_operations = plan.edit.file_operations.len(),
            "Applying plan"
        );

        tx.enter(ApplyState::Validating);
        ensure_not_cancelled(cancel)?;
        self.validate(plan).await?;

        tx.enter(ApplyState::Locking);
        let touched: Vec<PathBuf> = plan.edit.touched_paths().into_iter().collect();
        let lock_set = self.locks.acquire_all(&touched, self.lock_timeout).await?;
        ensure_not_cancelled(cancel)?;
        // Another apply may have landed while this one waited for its locks
        ChecksumValidator::validate_checksums(self.fs.as_ref(), plan).await?;
        self.check_targets(plan).await?;

        tx.enter(ApplyState::Snapshotting);
        let mut snapshots = SnapshotStore::new();
        snapshots.capture(self.fs.as_ref(), &touched).await?;
        ensure_not_cancelled(cancel)?;

        tx.enter(ApplyState::Writing);
        let source_dirs = self.source_directories(plan).await;
        if let Err(err) = self.write_all(plan, &snapshots, &source_dirs, cancel, &mut tx).await {
            error!(plan_id = %plan.id, error = %err, "Apply failed while writing, rolling back");
            tx.result.error = Some(ErrorResponse::from(&err));
            self.rollback(&snapshots, &mut tx).await;
            drop(lock_set);
            tx.enter(ApplyState::Released);
            return Ok(tx.finish());
        }

        if let Some(hook) = &self.verification {
            tx.enter(ApplyState::Verifying);
            let failure = match hook.verify(&self.project_root).await {
                Ok(validation) if validation.passed => {
                    tx.result.validation = Some(validation);
                    None
                }
                Ok(validation) => {
                    let err = RefitError::validation(format!(
                        "Post-apply validation '{}' failed with exit code {:?}",
                        validation.command, validation.exit_code
                    ));
                    tx.result.validation = Some(validation);
                    Some(err)
                }
                Err(err) => Some(err),
            };
            if let Some(err) = failure {
                warn!(plan_id = %plan.id, error = %err, "Post-apply validation failed, rolling back");
                tx.result.error = Some(ErrorResponse::from(&err));
                self.rollback(&snapshots, &mut tx).await;
                drop(lock_set);
                tx.enter(ApplyState::Released);
                return Ok(tx.finish());
            }
        }

        tx.enter(ApplyState::Committed);
        self.cache.invalidate(&touched).await;
        tx.result.success = true;
        drop(lock_set);
        tx.enter(ApplyState::Released);

        let result = tx.finish();
        info!(
            plan_id = %plan.id,
            files_modified = result.files_modified.len(),
            files_created = result.files_created.len(),
            files_deleted = result.files_deleted.len(),
            duration_ms = result.duration_ms,
            "Plan applied"
        );
        Ok(result)
    }

    /// Structural preconditions, checked before any lock is taken.
    async fn validate(&self, plan: &Plan) -> RefitResult<()> {
        ChecksumValidator::validate_checksums(self.fs.as_ref(), plan).await?;
        EditMerger::validate(&plan.edit)?;
        self.check_targets(plan).await
    }

    /// Edited files, move sources and delete targets exist; move and create
    /// destinations are free unless the operation may overwrite them.
    ///
    /// Runs again once the locks are held, since a competing apply may have
    /// created or removed any of these in the meantime.
    async fn check_targets(&self, plan: &Plan) -> RefitResult<()> {
        for path in plan.edit.edited_files() {
            if !self.fs.exists(path).await {
                return Err(RefitError::file_not_found(path.display().to_string()));
            }
        }

        for op in &plan.edit.file_operations {
            match op {
                FileOperation::Move { from, to, overwrite } => {
                    if !self.fs.exists(from).await {
                        return Err(RefitError::file_not_found(from.display().to_string()));
                    }
                    if !overwrite && self.fs.exists(to).await {
                        return Err(RefitError::already_exists(to.display().to_string()));
                    }
                }
                FileOperation::Create { path, overwrite, .. } => {
                    if !overwrite && self.fs.exists(path).await {
                        return Err(RefitError::already_exists(path.display().to_string()));
                    }
                }
                FileOperation::Delete { path } => {
                    if !self.fs.exists(path).await {
                        return Err(RefitError::file_not_found(path.display().to_string()));
                    }
                }
            }
        }
        Ok(())
    }

    /// Directories the operation moves or deletes as a whole. They are
    /// removed once the apply has emptied them.
    async fn source_directories(&self, plan: &Plan) -> Vec<SourceDir> {
        let candidates: Vec<(&Path, Option<&Path>)> = match &plan.operation {
            RefactorOperation::RenameDirectory {
                old_path, new_path, ..
            } => vec![(old_path.as_path(), Some(new_path.as_path()))],
            RefactorOperation::Move {
                source,
                destination,
                ..
            } => vec![(source.as_path(), Some(destination.as_path()))],
            RefactorOperation::BatchMove { moves, .. } => moves
                .iter()
                .map(|m| (m.source.as_path(), Some(m.destination.as_path())))
                .collect(),
            RefactorOperation::Delete {
                delete: DeleteTarget::Directory { path },
            } => vec![(path.as_path(), None)],
            _ => Vec::new(),
        };

        let mut dirs = Vec::new();
        for (path, destination) in candidates {
            if self.fs.is_dir(path).await && path != self.project_root {
                dirs.push(SourceDir {
                    path: path.to_path_buf(),
                    destination: destination.map(Path::to_path_buf),
                });
            }
        }
        dirs
    }

    async fn write_all(
        &self,
        plan: &Plan,
        snapshots: &SnapshotStore,
        source_dirs: &[SourceDir],
        cancel: &CancellationFlag,
        tx: &mut Transaction,
    ) -> RefitResult<()> {
        let moves: HashMap<&Path, &Path> = plan
            .edit
            .file_operations
            .iter()
            .filter_map(|op| match op {
                FileOperation::Move { from, to, .. } => Some((from.as_path(), to.as_path())),
                _ => None,
            })
            .collect();

        // Content first, at the pre-move path
        for (path, edits) in &plan.edit.changes {
            if edits.is_empty() {
                continue;
            }
            ensure_not_cancelled(cancel)?;
            let original = match snapshots.get(path) {
                Some(SnapshotState::Content(bytes)) => std::str::from_utf8(bytes).map_err(|_| {
                    RefitError::validation(format!("{} is not valid UTF-8", path.display()))
                })?,
                _ => return Err(RefitError::file_not_found(path.display().to_string())),
            };
            let rendered = EditMerger::apply_text_edits(path, original, edits)?;
            tx.write_log.push(Written::Path(path.clone()));
            self.fs
                .write_atomic(path, rendered.as_bytes())
                .await
                .map_err(|e| RefitError::io_at(path, e))?;
            let final_path = moves.get(path.as_path()).copied().unwrap_or(path.as_path());
            tx.result.files_modified.push(final_path.to_path_buf());
        }

        for op in &plan.edit.file_operations {
            if let FileOperation::Move { from, to, .. } = op {
                ensure_not_cancelled(cancel)?;
                self.ensure_parent(to, tx).await?;
                tx.write_log.push(Written::Move {
                    from: from.clone(),
                    to: to.clone(),
                });
                self.fs
                    .rename(from, to)
                    .await
                    .map_err(|e| RefitError::io_at(from, e))?;
                tx.result.files_deleted.push(from.clone());
                tx.result.files_created.push(to.clone());
            }
        }

        for op in &plan.edit.file_operations {
            if let FileOperation::Create { path, content, .. } = op {
                ensure_not_cancelled(cancel)?;
                self.ensure_parent(path, tx).await?;
                tx.write_log.push(Written::Path(path.clone()));
                self.fs
                    .write_atomic(path, content.as_bytes())
                    .await
                    .map_err(|e| RefitError::io_at(path, e))?;
                tx.result.files_created.push(path.clone());
            }
        }

        for op in &plan.edit.file_operations {
            if let FileOperation::Delete { path } = op {
                ensure_not_cancelled(cancel)?;
                tx.write_log.push(Written::Path(path.clone()));
                self.fs
                    .remove_file(path)
                    .await
                    .map_err(|e| RefitError::io_at(path, e))?;
                tx.result.files_deleted.push(path.clone());
            }
        }

        self.remove_emptied_dirs(source_dirs, tx).await?;

        ensure_not_cancelled(cancel)
    }

    async fn ensure_parent(&self, path: &Path, tx: &mut Transaction) -> RefitResult<()> {
        match path.parent() {
            Some(parent) => self.ensure_dir(parent, tx).await,
            None => Ok(()),
        }
    }

    /// Create `dir` and its missing ancestors, recording each one for rollback.
    async fn ensure_dir(&self, dir: &Path, tx: &mut Transaction) -> RefitResult<()> {
        let mut missing = Vec::new();
        let mut current = Some(dir);
        while let Some(ancestor) = current {
            if self.fs.exists(ancestor).await {
                break;
            }
            missing.push(ancestor.to_path_buf());
            current = ancestor.parent();
        }
        if missing.is_empty() {
            return Ok(());
        }
        self.fs
            .create_dir_all(dir)
            .await
            .map_err(|e| RefitError::io_at(dir, e))?;
        // Outermost first, so reverse-order removal goes innermost first
        tx.created_dirs.extend(missing.into_iter().rev());
        Ok(())
    }

    /// Remove every directory under each vacated source that is now empty,
    /// deepest first. Empty subdirectories of a moved directory are carried
    /// over to the destination.
    async fn remove_emptied_dirs(
        &self,
        source_dirs: &[SourceDir],
        tx: &mut Transaction,
    ) -> RefitResult<()> {
        for source in source_dirs {
            for dir in directories_deepest_first(&source.path).await? {
                // A directory that still holds anything simply fails to go
                if self.fs.remove_dir(&dir).await.is_err() {
                    continue;
                }
                debug!(dir = %dir.display(), "Removed emptied directory");
                tx.removed_dirs.push(dir.clone());
                if let (Some(destination), Ok(relative)) =
                    (&source.destination, dir.strip_prefix(&source.path))
                {
                    self.ensure_dir(&destination.join(relative), tx).await?;
                }
            }
        }
        Ok(())
    }

    async fn restore(&self, path: &Path, state: &SnapshotState) -> io::Result<()> {
        match state {
            SnapshotState::Content(bytes) => {
                if let Some(parent) = path.parent() {
                    self.fs.create_dir_all(parent).await?;
                }
                self.fs.write_atomic(path, bytes).await
            }
            SnapshotState::Absent => match self.fs.remove_file(path).await {
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        }
    }

    async fn restore_failure(
        &self,
        path: &Path,
        state: &SnapshotState,
        error: &io::Error,
        preserved_at: Option<PathBuf>,
    ) -> RestoreFailure {
        error!(file_path = %path.display(), error = %error, "Failed to restore file");
        let original_content = match state {
            SnapshotState::Content(bytes) => Some(bytes.clone()),
            SnapshotState::Absent => None,
        };
        RestoreFailure {
            path: path.to_path_buf(),
            error: error.to_string(),
            original_content,
            current_content: self.fs.read(path).await.ok(),
            preserved_at,
        }
    }

    async fn rollback(&self, snapshots: &SnapshotStore, tx: &mut Transaction) {
        tx.enter(ApplyState::RollingBack);
        tx.result.rolled_back = true;

        for dir in std::mem::take(&mut tx.removed_dirs) {
            if let Err(e) = self.fs.create_dir_all(&dir).await {
                warn!(dir = %dir.display(), error = %e, "Failed to recreate removed directory");
            }
        }

        let mut seen: HashSet<PathBuf> = HashSet::new();
        let log: Vec<Written> = tx.write_log.drain(..).rev().collect();
        for written in log {
            match written {
                Written::Path(path) => {
                    if !seen.insert(path.clone()) {
                        continue;
                    }
                    let Some(state) = snapshots.get(&path) else {
                        continue;
                    };
                    match self.restore(&path, state).await {
                        Ok(()) => tx.result.restored_files.push(path),
                        Err(e) => {
                            let failure = self.restore_failure(&path, state, &e, None).await;
                            tx.result.restore_failures.push(failure);
                        }
                    }
                }
                Written::Move { from, to } => {
                    let from_done = !seen.insert(from.clone());
                    let to_done = !seen.insert(to.clone());
                    if !from_done {
                        if let Some(state) = snapshots.get(&from) {
                            if let Err(e) = self.restore(&from, state).await {
                                // The destination holds the only remaining copy
                                let preserved_at =
                                    self.fs.exists(&to).await.then(|| to.clone());
                                let failure =
                                    self.restore_failure(&from, state, &e, preserved_at).await;
                                tx.result.restore_failures.push(failure);
                                continue;
                            }
                            tx.result.restored_files.push(from);
                        }
                    }
                    if to_done {
                        continue;
                    }
                    let Some(state) = snapshots.get(&to) else {
                        continue;
                    };
                    match self.restore(&to, state).await {
                        Ok(()) => tx.result.restored_files.push(to),
                        Err(e) => {
                            let failure = self.restore_failure(&to, state, &e, None).await;
                            tx.result.restore_failures.push(failure);
                        }
                    }
                }
            }
        }

        for dir in tx.created_dirs.drain(..).rev() {
            if let Err(e) = self.fs.remove_dir(&dir).await {
                debug!(dir = %dir.display(), error = %e, "Created directory not removed");
            }
        }

        self.cache.invalidate(snapshots.paths()).await;

        if tx.result.restore_failures.is_empty() {
            info!(restored = tx.result.restored_files.len(), "Rollback complete");
        } else {
            error!(
                restored = tx.result.restored_files.len(),
                failed = tx.result.restore_failures.len(),
                "Rollback incomplete"
            );
        }
        tx.result.files_modified.clear();
        tx.result.files_created.clear();
        tx.result.files_deleted.clear();
        tx.enter(ApplyState::RolledBack);
    }
}

/// Every directory under `root`, `root` included, children before parents.
async fn directories_deepest_first(root: &Path) -> RefitResult<Vec<PathBuf>> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || {
        WalkDir::new(&root)
            .contents_first(true)
            .follow_links(false)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_dir())
            .map(walkdir::DirEntry::into_path)
            .collect()
    })
    .await
    .map_err(|e| RefitError::internal(format!("Directory walk task failed: {}", e)))
}

fn ensure_not_cancelled(cancel: &CancellationFlag) -> RefitResult<()> {
    if cancel.is_cancelled() {
        return Err(RefitError::cancelled("apply"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::post_apply_validator::PostApplyValidator;
    use crate::services::workspace_fs::LocalFs;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use refit_config::ValidationConfig;
    use refit_foundation::{EditLocation, ErrorKind, TextEdit, ValidationResult, WorkspaceEdit};
    use std::fs;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().canonicalize().unwrap();
            Self { _dir: dir, root }
        }

        fn write(&self, rel: &str, content: &str) -> PathBuf {
            let path = self.root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            path
        }

        fn applier(&self) -> AtomicApplier {
            AtomicApplier::new(
                &self.root,
                Arc::new(LocalFs::new()),
                Arc::new(LockManager::new()),
                Arc::new(ImportCache::new(true)),
                Duration::from_millis(500),
            )
        }
    }

    async fn finalize(plan: &mut Plan) {
        let mut paths: Vec<PathBuf> = plan.edit.edited_files().cloned().collect();
        for op in &plan.edit.file_operations {
            match op {
                FileOperation::Move { from, .. } => paths.push(from.clone()),
                FileOperation::Delete { path } => paths.push(path.clone()),
                FileOperation::Create { .. } => {}
            }
        }
        plan.file_checksums = ChecksumValidator::checksum_files(&LocalFs::new(), &paths)
            .await
            .unwrap();
    }

    fn move_plan(from: &Path, to: &Path, importer: &Path) -> Plan {
        let mut edit = WorkspaceEdit::new();
        edit.add_edit(
            importer,
            TextEdit::replace(EditLocation::on_line(0, 15, 3), "./a", "./lib/a"),
        );
        edit.add_operation(FileOperation::Move {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            overwrite: false,
        });
        Plan::new(
            RefactorOperation::RenameFile {
                old_path: from.to_path_buf(),
                new_path: to.to_path_buf(),
                overwrite: false,
            },
            edit,
        )
    }

    #[tokio::test]
    async fn test_apply_commits_edits_and_moves() {
        let fx = Fixture::new();
        let a = fx.write("a.ts", "export const a = 1;\n");
        let b = fx.write("b.ts", "import a from './a';\n");
        let to = fx.root.join("lib/a.ts");
        let mut plan = move_plan(&a, &to, &b);
        finalize(&mut plan).await;

        let result = fx.applier().apply(&plan, &CancellationFlag::new()).await.unwrap();

        assert!(result.success);
        assert_eq!(result.final_state, ApplyState::Released);
        assert_eq!(
            result.state_history,
            vec![
                ApplyState::Validating,
                ApplyState::Locking,
                ApplyState::Snapshotting,
                ApplyState::Writing,
                ApplyState::Committed,
                ApplyState::Released,
            ]
        );
        assert_eq!(fs::read_to_string(&b).unwrap(), "import a from './lib/a';\n");
        assert_eq!(fs::read_to_string(&to).unwrap(), "export const a = 1;\n");
        assert!(!a.exists());
    }

    #[tokio::test]
    async fn test_stale_checksum_rejected_before_writing() {
        let fx = Fixture::new();
        let a = fx.write("a.ts", "export const a = 1;\n");
        let b = fx.write("b.ts", "import a from './a';\n");
        let mut plan = move_plan(&a, &fx.root.join("lib/a.ts"), &b);
        finalize(&mut plan).await;
        fs::write(&b, "import a from './a'; // touched\n").unwrap();

        let err = fx.applier().apply(&plan, &CancellationFlag::new()).await.unwrap_err();

        assert!(matches!(err, RefitError::StaleChecksum { .. }));
        assert!(a.exists());
        assert_eq!(fs::read_to_string(&b).unwrap(), "import a from './a'; // touched\n");
    }

    #[tokio::test]
    async fn test_occupied_destination_rejected() {
        let fx = Fixture::new();
        let a = fx.write("a.ts", "a\n");
        let b = fx.write("b.ts", "import a from './a';\n");
        let to = fx.write("lib/a.ts", "taken\n");
        let mut plan = move_plan(&a, &to, &b);
        finalize(&mut plan).await;

        let err = fx.applier().apply(&plan, &CancellationFlag::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(fs::read_to_string(&to).unwrap(), "taken\n");
    }

    #[tokio::test]
    async fn test_cancel_before_writing_is_an_error() {
        let fx = Fixture::new();
        let a = fx.write("a.ts", "a\n");
        let b = fx.write("b.ts", "import a from './a';\n");
        let mut plan = move_plan(&a, &fx.root.join("lib/a.ts"), &b);
        finalize(&mut plan).await;

        let cancel = CancellationFlag::new();
        cancel.cancel();
        let err = fx.applier().apply(&plan, &cancel).await.unwrap_err();
        assert!(matches!(err, RefitError::Cancelled { .. }));
        assert!(a.exists());
    }

    struct Rejecting;

    #[async_trait]
    impl VerificationHook for Rejecting {
        async fn verify(&self, _project_root: &Path) -> RefitResult<ValidationResult> {
            Ok(ValidationResult {
                passed: false,
                command: "check".to_string(),
                exit_code: Some(2),
                stdout: String::new(),
                stderr: "type error".to_string(),
                duration_ms: 1,
            })
        }
    }

    #[tokio::test]
    async fn test_failed_verification_rolls_back() {
        let fx = Fixture::new();
        let a = fx.write("a.ts", "export const a = 1;\n");
        let b = fx.write("b.ts", "import a from './a';\n");
        let to = fx.root.join("lib/a.ts");
        let mut plan = move_plan(&a, &to, &b);
        finalize(&mut plan).await;

        let result = fx
            .applier()
            .with_verification(Arc::new(Rejecting))
            .apply(&plan, &CancellationFlag::new())
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.rolled_back);
        assert!(result.workspace_restored());
        assert!(result.visited(ApplyState::Verifying));
        assert!(result.visited(ApplyState::RolledBack));
        assert_eq!(result.validation.as_ref().unwrap().exit_code, Some(2));
        assert_eq!(fs::read_to_string(&a).unwrap(), "export const a = 1;\n");
        assert_eq!(fs::read_to_string(&b).unwrap(), "import a from './a';\n");
        assert!(!to.exists());
        assert!(!fx.root.join("lib").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_verification_rolls_back() {
        let fx = Fixture::new();
        let a = fx.write("a.ts", "export const a = 1;\n");
        let b = fx.write("b.ts", "import a from './a';\n");
        let to = fx.root.join("lib/a.ts");
        let mut plan = move_plan(&a, &to, &b);
        finalize(&mut plan).await;

        let validator = PostApplyValidator::new(ValidationConfig {
            enabled: true,
            command: "test -f a.ts".to_string(),
            timeout_seconds: 5,
            fail_on_stderr: false,
        });
        let result = fx
            .applier()
            .with_verification(Arc::new(validator))
            .apply(&plan, &CancellationFlag::new())
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.workspace_restored());
        assert!(a.exists());
    }

    fn rename_dir_plan(old: &Path, new: &Path) -> Plan {
        let mut edit = WorkspaceEdit::new();
        for entry in walkdir::WalkDir::new(old) {
            let entry = entry.unwrap();
            if entry.file_type().is_file() {
                let file = entry.into_path();
                edit.add_operation(FileOperation::Move {
                    to: new.join(file.strip_prefix(old).unwrap()),
                    from: file,
                    overwrite: false,
                });
            }
        }
        Plan::new(
            RefactorOperation::RenameDirectory {
                old_path: old.to_path_buf(),
                new_path: new.to_path_buf(),
                overwrite: false,
            },
            edit,
        )
    }

    #[tokio::test]
    async fn test_directory_rename_removes_emptied_source() {
        let fx = Fixture::new();
        fx.write("old/x.md", "x\n");
        fx.write("old/sub/y.md", "y\n");
        fs::create_dir_all(fx.root.join("old/empty/deeper")).unwrap();
        let old = fx.root.join("old");
        let new = fx.root.join("new");
        let mut plan = rename_dir_plan(&old, &new);
        finalize(&mut plan).await;

        let result = fx.applier().apply(&plan, &CancellationFlag::new()).await.unwrap();
        assert!(result.success);
        assert!(!old.exists());
        assert_eq!(fs::read_to_string(new.join("sub/y.md")).unwrap(), "y\n");
        assert!(new.join("empty/deeper").is_dir());
    }

    #[tokio::test]
    async fn test_rollback_recreates_removed_directories() {
        let fx = Fixture::new();
        fx.write("old/sub/y.md", "y\n");
        fs::create_dir_all(fx.root.join("old/empty")).unwrap();
        let old = fx.root.join("old");
        let new = fx.root.join("new");
        let mut plan = rename_dir_plan(&old, &new);
        finalize(&mut plan).await;

        let result = fx
            .applier()
            .with_verification(Arc::new(Rejecting))
            .apply(&plan, &CancellationFlag::new())
            .await
            .unwrap();

        assert!(result.workspace_restored());
        assert!(old.join("empty").is_dir());
        assert_eq!(fs::read_to_string(old.join("sub/y.md")).unwrap(), "y\n");
        assert!(!new.exists());
    }

    #[tokio::test]
    async fn test_destination_taken_after_planning_is_rejected() {
        let fx = Fixture::new();
        let a = fx.write("a.ts", "a\n");
        let b = fx.write("b.ts", "import a from './a';\n");
        let to = fx.root.join("lib/a.ts");
        let mut plan = move_plan(&a, &to, &b);
        finalize(&mut plan).await;
        fx.write("lib/a.ts", "created meanwhile\n");

        let err = fx.applier().apply(&plan, &CancellationFlag::new()).await.unwrap_err();
        assert!(matches!(err, RefitError::AlreadyExists { .. }));
        assert_eq!(fs::read_to_string(&to).unwrap(), "created meanwhile\n");
        assert!(a.exists());
    }
}
