//! File and directory rename/move planning

use super::{Draft, PlanBuilder};
use crate::services::path_utils::{display_relative, rebase};
use crate::services::reference_updater::MoveContext;
use refit_foundation::{FileOperation, RefitError, RefitResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum PathKind {
    File,
    Directory,
}

/// A validated move with the kind of its source.
pub(super) struct CheckedMove {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub kind: PathKind,
}

impl PlanBuilder {
    /// Check one move against the current filesystem.
    pub(super) async fn check_move(
        &self,
        source: &Path,
        destination: &Path,
        overwrite: bool,
        expected: Option<PathKind>,
    ) -> RefitResult<CheckedMove> {
        self.ensure_in_root(source)?;
        self.ensure_in_root(destination)?;

        if source == destination {
            return Err(RefitError::invalid_request(format!(
                "Source and destination are the same path: {}",
                source.display()
            )));
        }
        if source == self.project_root {
            return Err(RefitError::invalid_request("The project root cannot be moved"));
        }
        if !self.fs.exists(source).await {
            return Err(RefitError::file_not_found(source.display().to_string()));
        }

        let kind = if self.fs.is_dir(source).await {
            PathKind::Directory
        } else {
            PathKind::File
        };
        match (expected, kind) {
            (Some(PathKind::File), PathKind::Directory) => {
                return Err(RefitError::invalid_request(format!(
                    "{} is a directory",
                    display_relative(&self.project_root, source)
                )));
            }
            (Some(PathKind::Directory), PathKind::File) => {
                return Err(RefitError::invalid_request(format!(
                    "{} is not a directory",
                    display_relative(&self.project_root, source)
                )));
            }
            _ => {}
        }

        if kind == PathKind::Directory && destination.starts_with(source) {
            return Err(RefitError::invalid_request(format!(
                "Cannot move {} into its own subtree",
                display_relative(&self.project_root, source)
            )));
        }

        if self.fs.exists(destination).await {
            if !overwrite {
                return Err(RefitError::already_exists(destination.display().to_string()));
            }
            if kind == PathKind::File && self.fs.is_dir(destination).await {
                return Err(RefitError::invalid_request(format!(
                    "Cannot overwrite directory {} with a file",
                    display_relative(&self.project_root, destination)
                )));
            }
        }

        Ok(CheckedMove {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            kind,
        })
    }

    /// Per-file move operations and the move map references are computed against.
    pub(super) async fn expand_moves(
        &self,
        moves: &[CheckedMove],
        overwrite: bool,
    ) -> RefitResult<(Vec<FileOperation>, MoveContext)> {
        let mut operations = Vec::new();
        let mut context = MoveContext::new();

        for m in moves {
            match m.kind {
                PathKind::File => {
                    context.add_file(&m.source, &m.destination);
                    operations.push(FileOperation::Move {
                        from: m.source.clone(),
                        to: m.destination.clone(),
                        overwrite,
                    });
                }
                PathKind::Directory => {
                    let files = self.references.discovery().files_under(&m.source).await?;
                    if files.is_empty() {
                        return Err(RefitError::invalid_request(format!(
                            "Directory {} contains no files to move",
                            display_relative(&self.project_root, &m.source)
                        )));
                    }
                    for file in files {
                        let Some(to) = rebase(&file, &m.source, &m.destination) else {
                            continue;
                        };
                        if !overwrite && self.fs.exists(&to).await {
                            return Err(RefitError::already_exists(to.display().to_string()));
                        }
                        context.add_file(&file, &to);
                        operations.push(FileOperation::Move {
                            from: file,
                            to,
                            overwrite,
                        });
                    }
                    context.add_dir(&m.source, &m.destination);
                    debug!(
                        source = %m.source.display(),
                        files = operations.len(),
                        "Expanded directory move"
                    );
                }
            }
        }

        Ok((operations, context))
    }

    pub(super) async fn plan_move(
        &self,
        source: &Path,
        destination: &Path,
        overwrite: bool,
        expected: Option<PathKind>,
    ) -> RefitResult<Draft> {
        info!(
            source = %source.display(),
            destination = %destination.display(),
            "Planning move"
        );
        let checked = self.check_move(source, destination, overwrite, expected).await?;
        self.plan_checked_moves(&[checked], overwrite).await
    }

    /// Moves plus the reference edits keeping every dependent resolving.
    pub(super) async fn plan_checked_moves(
        &self,
        moves: &[CheckedMove],
        overwrite: bool,
    ) -> RefitResult<Draft> {
        let (operations, context) = self.expand_moves(moves, overwrite).await?;
        let references = self.references.plan_moves(&context).await?;

        let mut edit = references.edit;
        for op in operations {
            edit.add_operation(op);
        }
        let mut draft = Draft::new(edit);
        draft.warnings = references.warnings;
        draft.dependents = references.dependents;
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::Fixture;
    use pretty_assertions::assert_eq;
    use refit_foundation::{ErrorKind, FileOperation, RefactorOperation, RefitError};

    fn rename_file(old: &str, new: &str) -> RefactorOperation {
        RefactorOperation::RenameFile {
            old_path: old.into(),
            new_path: new.into(),
            overwrite: false,
        }
    }

    #[tokio::test]
    async fn test_move_onto_itself_is_invalid() {
        let fx = Fixture::new();
        fx.write("a.md", "a\n");
        let err = fx.builder().build(rename_file("a.md", "./a.md")).await.unwrap_err();
        assert!(matches!(err, RefitError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn test_missing_source_is_not_found() {
        let fx = Fixture::new();
        let err = fx.builder().build(rename_file("missing.md", "b.md")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_existing_destination_needs_overwrite() {
        let fx = Fixture::new();
        fx.write("a.md", "a\n");
        fx.write("b.md", "b\n");
        let err = fx.builder().build(rename_file("a.md", "b.md")).await.unwrap_err();
        assert!(matches!(err, RefitError::AlreadyExists { .. }));

        let plan = fx
            .builder()
            .build(RefactorOperation::RenameFile {
                old_path: "a.md".into(),
                new_path: "b.md".into(),
                overwrite: true,
            })
            .await
            .unwrap()
            .into_plan()
            .unwrap();
        assert_eq!(plan.edit.file_operations.len(), 1);
    }

    #[tokio::test]
    async fn test_directory_into_own_subtree_is_invalid() {
        let fx = Fixture::new();
        fx.write("docs/a.md", "a\n");
        let err = fx
            .builder()
            .build(RefactorOperation::RenameDirectory {
                old_path: "docs".into(),
                new_path: "docs/archive".into(),
                overwrite: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RefitError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn test_rename_file_on_directory_is_invalid() {
        let fx = Fixture::new();
        fx.write("docs/a.md", "a\n");
        let err = fx.builder().build(rename_file("docs", "guide")).await.unwrap_err();
        assert!(matches!(err, RefitError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn test_directory_move_expands_per_file() {
        let fx = Fixture::new();
        let a = fx.write("docs/a.md", "See [b](sub/b.md)\n");
        let b = fx.write("docs/sub/b.md", "b\n");
        let readme = fx.write("README.md", "Read docs/sub/b.md first.\n");

        let plan = fx
            .builder()
            .build(RefactorOperation::RenameDirectory {
                old_path: "docs".into(),
                new_path: "guide".into(),
                overwrite: false,
            })
            .await
            .unwrap()
            .into_plan()
            .unwrap();

        assert_eq!(
            plan.edit.file_operations,
            vec![
                FileOperation::Move {
                    from: a.clone(),
                    to: fx.root.join("guide/a.md"),
                    overwrite: false,
                },
                FileOperation::Move {
                    from: b,
                    to: fx.root.join("guide/sub/b.md"),
                    overwrite: false,
                },
            ]
        );
        // The link inside the moved directory still resolves relative to it
        assert!(plan.edit.changes.get(&a).is_none());
        let readme_edits = &plan.edit.changes[&readme];
        assert_eq!(readme_edits.len(), 1);
        assert_eq!(readme_edits[0].new_text, "guide/sub/b.md");
        assert_eq!(plan.impact.dependent_files, vec![readme]);
    }
}
