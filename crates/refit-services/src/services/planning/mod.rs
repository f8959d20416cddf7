//! Plan generation
//!
//! [`PlanBuilder::build`] turns a [`RefactorOperation`] into a [`Plan`]
//! without writing anything. Every plan goes through the edit merger,
//! records checksums for the files it reads and carries an impact analysis.

mod batch;
mod delete;
mod file_ops;
mod refactor_ops;
mod symbol;

use super::checksum_validator::ChecksumValidator;
use super::edit_merger::EditMerger;
use super::impact_analyzer::ImpactAnalyzer;
use super::path_utils::resolve_in_root;
use super::reference_updater::ReferenceUpdater;
use super::workspace_fs::WorkspaceFs;
use refit_foundation::{
    DeleteTarget, FileOperation, ImpactAnalysis, Plan, PlanOutcome, PlanWarning, RefactorOperation,
    RefitError, RefitResult, SymbolTarget, WorkspaceEdit,
};
use refit_lsp::CodeIntelligence;
use refit_plugin_api::PluginRegistry;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub use symbol::is_valid_identifier;

pub struct PlanBuilder {
    project_root: PathBuf,
    fs: Arc<dyn WorkspaceFs>,
    registry: Arc<PluginRegistry>,
    references: Arc<ReferenceUpdater>,
    intelligence: Arc<dyn CodeIntelligence>,
}

/// Pieces of a plan before merging and checksumming.
struct Draft {
    edits: Vec<WorkspaceEdit>,
    warnings: Vec<PlanWarning>,
    dependents: Vec<PathBuf>,
}

impl Draft {
    fn new(edit: WorkspaceEdit) -> Self {
        Self {
            edits: vec![edit],
            warnings: Vec::new(),
            dependents: Vec::new(),
        }
    }
}

impl PlanBuilder {
    pub fn new(
        project_root: impl Into<PathBuf>,
        fs: Arc<dyn WorkspaceFs>,
        registry: Arc<PluginRegistry>,
        references: Arc<ReferenceUpdater>,
        intelligence: Arc<dyn CodeIntelligence>,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            fs,
            registry,
            references,
            intelligence,
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Build a plan for `operation`. Nothing is written.
    pub async fn build(&self, operation: RefactorOperation) -> RefitResult<PlanOutcome> {
        info!(operation = operation.label(), "Building plan");
        let operation = self.anchor(operation);

        let draft = match &operation {
            RefactorOperation::RenameFile {
                old_path,
                new_path,
                overwrite,
            } => {
                self.plan_move(old_path, new_path, *overwrite, Some(file_ops::PathKind::File))
                    .await?
            }
            RefactorOperation::RenameDirectory {
                old_path,
                new_path,
                overwrite,
            } => {
                self.plan_move(old_path, new_path, *overwrite, Some(file_ops::PathKind::Directory))
                    .await?
            }
            RefactorOperation::Move {
                source,
                destination,
                overwrite,
            } => self.plan_move(source, destination, *overwrite, None).await?,
            RefactorOperation::BatchMove { moves, overwrite } => {
                self.plan_batch_move(moves, *overwrite).await?
            }
            RefactorOperation::RenameSymbol { target, new_name } => {
                match self.plan_symbol_rename(target, new_name).await? {
                    symbol::SymbolPlan::Draft(draft) => draft,
                    symbol::SymbolPlan::Candidates(candidates) => {
                        info!(candidates = candidates.len(), "Symbol name is ambiguous");
                        return Ok(PlanOutcome::NeedsDisambiguation { candidates });
                    }
                }
            }
            RefactorOperation::Extract {
                extract,
                file,
                range,
                name,
            } => self.plan_extract(*extract, file, *range, name).await?,
            RefactorOperation::Inline {
                inline,
                file,
                position,
            } => self.plan_inline(*inline, file, *position).await?,
            RefactorOperation::Delete { delete } => self.plan_delete(delete).await?,
        };

        let plan = self.finalize(operation, draft).await?;
        info!(
            plan_id = %plan.id,
            affected_files = plan.affected_files.len(),
            changes = plan.estimated_change_count,
            risk = ?plan.impact.risk,
            warnings = plan.warnings.len(),
            "Plan ready"
        );
        Ok(PlanOutcome::ready(plan))
    }

    /// Risk and dependents of `operation`, without computing edits.
    pub async fn analyze_impact(&self, operation: RefactorOperation) -> RefitResult<ImpactAnalysis> {
        let operation = self.anchor(operation);
        let symbol_rename = operation.is_symbol_rename();

        let (dependents, estimated): (Vec<PathBuf>, usize) = match &operation {
            RefactorOperation::RenameFile { old_path, .. }
            | RefactorOperation::RenameDirectory { old_path, .. } => {
                self.path_dependents(std::slice::from_ref(old_path)).await?
            }
            RefactorOperation::Move { source, .. } => {
                self.path_dependents(std::slice::from_ref(source)).await?
            }
            RefactorOperation::BatchMove { moves, .. } => {
                let sources: Vec<PathBuf> = moves.iter().map(|m| m.source.clone()).collect();
                self.path_dependents(&sources).await?
            }
            RefactorOperation::RenameSymbol { target, .. } => {
                let (file, position) = self.locate_symbol_for_impact(target).await?;
                let locations = self.intelligence.find_references(&file, position).await?;
                let files = locations.iter().map(|l| l.path.clone()).collect();
                (files, locations.len())
            }
            RefactorOperation::Extract { file, .. } | RefactorOperation::Inline { file, .. } => {
                (vec![file.clone()], 1)
            }
            RefactorOperation::Delete { delete } => match delete {
                DeleteTarget::File { path } | DeleteTarget::Directory { path } => {
                    self.path_dependents(std::slice::from_ref(path)).await?
                }
                DeleteTarget::Symbol { file, position } => {
                    let locations = self.intelligence.find_references(file, *position).await?;
                    let files: Vec<PathBuf> = locations
                        .iter()
                        .map(|l| l.path.clone())
                        .filter(|p| p != file)
                        .collect();
                    let count = files.len();
                    (files, count + 1)
                }
            },
        };

        Ok(ImpactAnalyzer::analyze(dependents, estimated, symbol_rename))
    }

    /// Dependents of moved or deleted paths, and one change per reference.
    async fn path_dependents(&self, targets: &[PathBuf]) -> RefitResult<(Vec<PathBuf>, usize)> {
        let dependents = self.references.find_dependents(targets).await?;
        let references: usize = dependents.values().map(BTreeSet::len).sum();
        Ok((dependents.into_keys().collect(), references + targets.len()))
    }

    async fn locate_symbol_for_impact(
        &self,
        target: &SymbolTarget,
    ) -> RefitResult<(PathBuf, refit_foundation::Position)> {
        match self.resolve_symbol_target(target).await? {
            symbol::ResolvedTarget::At { file, position } => Ok((file, position)),
            symbol::ResolvedTarget::Ambiguous(candidates) => Err(RefitError::invalid_request(
                format!(
                    "Symbol name matches {} declarations; pass a file and position",
                    candidates.len()
                ),
            )),
        }
    }

    /// Make every path in the operation absolute under the project root.
    fn anchor(&self, operation: RefactorOperation) -> RefactorOperation {
        let root = &self.project_root;
        let at = |p: PathBuf| resolve_in_root(root, &p);
        match operation {
            RefactorOperation::RenameFile {
                old_path,
                new_path,
                overwrite,
            } => RefactorOperation::RenameFile {
                old_path: at(old_path),
                new_path: at(new_path),
                overwrite,
            },
            RefactorOperation::RenameDirectory {
                old_path,
                new_path,
                overwrite,
            } => RefactorOperation::RenameDirectory {
                old_path: at(old_path),
                new_path: at(new_path),
                overwrite,
            },
            RefactorOperation::Move {
                source,
                destination,
                overwrite,
            } => RefactorOperation::Move {
                source: at(source),
                destination: at(destination),
                overwrite,
            },
            RefactorOperation::BatchMove { moves, overwrite } => RefactorOperation::BatchMove {
                moves: moves
                    .into_iter()
                    .map(|m| refit_foundation::MoveSpec {
                        source: at(m.source),
                        destination: at(m.destination),
                    })
                    .collect(),
                overwrite,
            },
            RefactorOperation::RenameSymbol { target, new_name } => {
                let target = match target {
                    SymbolTarget::Position { file, position } => SymbolTarget::Position {
                        file: at(file),
                        position,
                    },
                    SymbolTarget::Name { name, file } => SymbolTarget::Name {
                        name,
                        file: file.map(at),
                    },
                };
                RefactorOperation::RenameSymbol { target, new_name }
            }
            RefactorOperation::Extract {
                extract,
                file,
                range,
                name,
            } => RefactorOperation::Extract {
                extract,
                file: at(file),
                range,
                name,
            },
            RefactorOperation::Inline {
                inline,
                file,
                position,
            } => RefactorOperation::Inline {
                inline,
                file: at(file),
                position,
            },
            RefactorOperation::Delete { delete } => RefactorOperation::Delete {
                delete: match delete {
                    DeleteTarget::Symbol { file, position } => DeleteTarget::Symbol {
                        file: at(file),
                        position,
                    },
                    DeleteTarget::File { path } => DeleteTarget::File { path: at(path) },
                    DeleteTarget::Directory { path } => DeleteTarget::Directory { path: at(path) },
                },
            },
        }
    }

    /// Paths must stay inside the project root.
    fn ensure_in_root(&self, path: &Path) -> RefitResult<()> {
        if path.starts_with(&self.project_root) {
            Ok(())
        } else {
            Err(RefitError::invalid_request(format!(
                "{} is outside the project root {}",
                path.display(),
                self.project_root.display()
            )))
        }
    }

    /// Merge, checksum and analyse a draft.
    async fn finalize(&self, operation: RefactorOperation, draft: Draft) -> RefitResult<Plan> {
        let symbol_rename = operation.is_symbol_rename();
        let edit = EditMerger::merge(draft.edits)?;

        let mut checksummed: BTreeSet<PathBuf> = edit.edited_files().cloned().collect();
        for op in &edit.file_operations {
            match op {
                FileOperation::Move { from, .. } => {
                    checksummed.insert(from.clone());
                }
                FileOperation::Delete { path } => {
                    checksummed.insert(path.clone());
                }
                FileOperation::Create { .. } => {}
            }
        }
        let checksummed: Vec<PathBuf> = checksummed.into_iter().collect();
        // Snapshots hold content, so a link could only ever be restored as a copy
        for path in &checksummed {
            if self.fs.is_symlink(path).await {
                return Err(RefitError::invalid_request(format!(
                    "{} is a symbolic link; refactor its target instead",
                    path.display()
                )));
            }
        }
        let file_checksums =
            ChecksumValidator::checksum_files(self.fs.as_ref(), &checksummed).await?;

        let mut plan = Plan::new(operation, edit);
        plan.impact =
            ImpactAnalyzer::analyze(draft.dependents, plan.estimated_change_count, symbol_rename);
        plan.warnings = draft.warnings;
        plan.file_checksums = file_checksums;
        debug!(
            plan_id = %plan.id,
            checksums = plan.file_checksums.len(),
            "Recorded plan checksums"
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::workspace_fs::LocalFs;
    use pretty_assertions::assert_eq;
    use refit_config::RefactorConfig;
    use refit_foundation::{
        Diagnostic, ErrorKind, Location, Position, RiskLevel, SymbolCandidate,
    };
    use refit_lsp::NoCodeIntelligence;
    use std::fs;

    mockall::mock! {
        pub Intelligence {}

        #[async_trait::async_trait]
        impl CodeIntelligence for Intelligence {
            async fn find_references(&self, file: &Path, position: Position) -> RefitResult<Vec<Location>>;
            async fn rename_symbol(&self, file: &Path, position: Position, new_name: &str) -> RefitResult<WorkspaceEdit>;
            async fn find_symbols(&self, name: &str) -> RefitResult<Vec<SymbolCandidate>>;
            async fn get_diagnostics(&self, file: &Path) -> RefitResult<Vec<Diagnostic>>;
            async fn restart(&self, extensions: Option<Vec<String>>) -> RefitResult<()>;
            async fn shutdown(&self) -> RefitResult<()>;
        }
    }

    pub(super) struct Fixture {
        _dir: tempfile::TempDir,
        pub root: PathBuf,
    }

    impl Fixture {
        pub fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().canonicalize().unwrap();
            Self { _dir: dir, root }
        }

        pub fn write(&self, rel: &str, content: &str) -> PathBuf {
            let path = self.root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            path
        }

        pub fn builder_with(&self, intelligence: Arc<dyn CodeIntelligence>) -> PlanBuilder {
            self.builder_full(PluginRegistry::new(), intelligence)
        }

        pub fn builder_full(
            &self,
            registry: PluginRegistry,
            intelligence: Arc<dyn CodeIntelligence>,
        ) -> PlanBuilder {
            let fs: Arc<dyn WorkspaceFs> = Arc::new(LocalFs::new());
            let registry = Arc::new(registry);
            let references = Arc::new(ReferenceUpdater::new(
                &self.root,
                registry.clone(),
                fs.clone(),
                &RefactorConfig::default(),
                true,
            ));
            PlanBuilder::new(&self.root, fs, registry, references, intelligence)
        }

        pub fn builder(&self) -> PlanBuilder {
            self.builder_with(Arc::new(NoCodeIntelligence))
        }
    }

    #[tokio::test]
    async fn test_relative_paths_are_anchored_at_root() {
        let fx = Fixture::new();
        fx.write("docs/a.md", "# A\n");
        fx.write("README.md", "See [a](docs/a.md).\n");

        let plan = fx
            .builder()
            .build(RefactorOperation::Move {
                source: "docs/a.md".into(),
                destination: "guide/a.md".into(),
                overwrite: false,
            })
            .await
            .unwrap()
            .into_plan()
            .unwrap();

        assert_eq!(
            plan.edit.file_operations,
            vec![FileOperation::Move {
                from: fx.root.join("docs/a.md"),
                to: fx.root.join("guide/a.md"),
                overwrite: false,
            }]
        );
        assert_eq!(plan.impact.dependent_files, vec![fx.root.join("README.md")]);
        assert!(plan.file_checksums.contains_key(&fx.root.join("README.md")));
        assert!(plan.file_checksums.contains_key(&fx.root.join("docs/a.md")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_source_rejected() {
        let fx = Fixture::new();
        let target = fx.write("docs/real.md", "# Real\n");
        std::os::unix::fs::symlink(&target, fx.root.join("docs/link.md")).unwrap();

        let err = fx
            .builder()
            .build(RefactorOperation::Move {
                source: "docs/link.md".into(),
                destination: "guide/link.md".into(),
                overwrite: false,
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("symbolic link"));
        assert!(fx.root.join("docs/link.md").exists());
        assert!(!fx.root.join("guide").exists());
    }

    #[tokio::test]
    async fn test_paths_outside_root_rejected() {
        let fx = Fixture::new();
        fx.write("a.md", "a\n");
        let err = fx
            .builder()
            .build(RefactorOperation::Move {
                source: "a.md".into(),
                destination: "../elsewhere/a.md".into(),
                overwrite: false,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_analyze_impact_for_move() {
        let fx = Fixture::new();
        fx.write("docs/a.md", "# A\n");
        fx.write("README.md", "See [a](docs/a.md).\n");
        fx.write("notes.txt", "Also docs/a.md\n");

        let impact = fx
            .builder()
            .analyze_impact(RefactorOperation::Move {
                source: "docs/a.md".into(),
                destination: "guide/a.md".into(),
                overwrite: false,
            })
            .await
            .unwrap();

        assert_eq!(impact.risk, RiskLevel::Low);
        assert_eq!(
            impact.dependent_files,
            vec![fx.root.join("README.md"), fx.root.join("notes.txt")]
        );
    }
}
