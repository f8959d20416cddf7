//! Delete planning for files, directories and symbols
//!
//! Deletes never rewrite their dependents. Anything still pointing at the
//! removed path or symbol is reported as a `DANGLING_REFERENCES` warning.

use super::{Draft, PlanBuilder};
use crate::services::path_utils::display_relative;
use refit_foundation::{
    warning_codes, DeleteTarget, FileOperation, Location, PlanWarning, Position, RefitError,
    RefitResult, WorkspaceEdit,
};
use refit_plugin_api::DeleteSymbolParams;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

impl PlanBuilder {
    pub(super) async fn plan_delete(&self, target: &DeleteTarget) -> RefitResult<Draft> {
        match target {
            DeleteTarget::File { path } => self.plan_delete_path(path, false).await,
            DeleteTarget::Directory { path } => self.plan_delete_path(path, true).await,
            DeleteTarget::Symbol { file, position } => self.plan_delete_symbol(file, *position).await,
        }
    }

    async fn plan_delete_path(&self, path: &Path, directory: bool) -> RefitResult<Draft> {
        self.ensure_in_root(path)?;
        if path == self.project_root {
            return Err(RefitError::invalid_request("The project root cannot be deleted"));
        }
        if !self.fs.exists(path).await {
            return Err(RefitError::file_not_found(path.display().to_string()));
        }
        let is_dir = self.fs.is_dir(path).await;
        if is_dir != directory {
            return Err(RefitError::invalid_request(format!(
                "{} is {}a directory",
                display_relative(&self.project_root, path),
                if is_dir { "" } else { "not " }
            )));
        }

        let files = if directory {
            self.references.discovery().files_under(path).await?
        } else {
            vec![path.to_path_buf()]
        };
        info!(path = %path.display(), files = files.len(), "Planning delete");

        let mut edit = WorkspaceEdit::new();
        for file in &files {
            edit.add_operation(FileOperation::Delete { path: file.clone() });
        }

        let dependents = self
            .references
            .find_dependents(std::slice::from_ref(&path.to_path_buf()))
            .await?;
        let mut draft = Draft::new(edit);
        for (dependent, targets) in &dependents {
            draft.warnings.push(PlanWarning::new(
                warning_codes::DANGLING_REFERENCES,
                format!(
                    "{} still references {}",
                    display_relative(&self.project_root, dependent),
                    targets
                        .iter()
                        .map(|t| display_relative(&self.project_root, t))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            ));
        }
        draft.dependents = dependents.into_keys().collect();
        Ok(draft)
    }

    async fn plan_delete_symbol(&self, file: &Path, position: Position) -> RefitResult<Draft> {
        self.ensure_in_root(file)?;
        let provider = self
            .registry
            .refactoring_provider_for(file)
            .filter(|p| p.supports_symbol_delete())
            .ok_or_else(|| RefitError::NotSupported {
                operation: "delete_symbol".to_string(),
                reason: Some(format!(
                    "No symbol delete support for {}",
                    display_relative(&self.project_root, file)
                )),
            })?;

        let source = self.read(file).await?;
        let params = DeleteSymbolParams {
            file_path: file.to_path_buf(),
            position,
        };
        let edit = provider.plan_delete_symbol(&source, &params).await?;
        info!(file_path = %file.display(), line = position.line, "Planning symbol delete");

        let removed: Vec<_> = edit
            .changes
            .get(file)
            .map(|edits| edits.iter().map(|e| e.location).collect())
            .unwrap_or_default();

        let mut warnings = Vec::new();
        let mut dependents = BTreeSet::new();
        match self.intelligence.find_references(file, position).await {
            Ok(locations) => {
                let remaining: Vec<&Location> = locations
                    .iter()
                    .filter(|l| !(l.path == file && removed.iter().any(|r| r.overlaps(&l.range))))
                    .collect();
                for location in &remaining {
                    dependents.insert(location.path.clone());
                }
                if !remaining.is_empty() {
                    warnings.push(PlanWarning::new(
                        warning_codes::DANGLING_REFERENCES,
                        format!(
                            "{} reference(s) to the deleted symbol remain in {} file(s)",
                            remaining.len(),
                            dependents.len()
                        ),
                    ));
                }
            }
            Err(e) => {
                warn!(error = %e, "Could not check references of deleted symbol");
                warnings.push(PlanWarning::new(
                    warning_codes::DANGLING_REFERENCES,
                    format!("References to the deleted symbol were not checked: {}", e),
                ));
            }
        }

        dependents.remove(file);
        let mut draft = Draft::new(edit);
        draft.warnings = warnings;
        draft.dependents = dependents.into_iter().collect::<Vec<PathBuf>>();
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{Fixture, MockIntelligence};
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use refit_foundation::{EditLocation, RefactorOperation, TextEdit};
    use refit_plugin_api::{
        LanguageMetadata, LanguagePlugin, PluginRegistry, PluginResult, RefactoringProvider,
    };
    use std::sync::Arc;

    /// Deletes the whole line at the requested position.
    struct LineDeleter;

    #[async_trait]
    impl RefactoringProvider for LineDeleter {
        fn supports_symbol_delete(&self) -> bool {
            true
        }

        async fn plan_delete_symbol(
            &self,
            source: &str,
            params: &DeleteSymbolParams,
        ) -> PluginResult<WorkspaceEdit> {
            let line = params.position.line;
            let text = source.lines().nth(line as usize).unwrap();
            let mut edit = WorkspaceEdit::new();
            edit.add_edit(
                &params.file_path,
                TextEdit::replace(
                    EditLocation::new(line, 0, line + 1, 0),
                    format!("{}\n", text),
                    "",
                ),
            );
            Ok(edit)
        }
    }

    struct TestPlugin(LineDeleter);

    const META: LanguageMetadata = LanguageMetadata {
        name: "Test",
        extensions: &["tst"],
    };

    impl LanguagePlugin for TestPlugin {
        fn metadata(&self) -> &LanguageMetadata {
            &META
        }

        fn refactoring_provider(&self) -> Option<&dyn RefactoringProvider> {
            Some(&self.0)
        }
    }

    fn delete(target: DeleteTarget) -> RefactorOperation {
        RefactorOperation::Delete { delete: target }
    }

    #[tokio::test]
    async fn test_delete_file_warns_about_dangling_links() {
        let fx = Fixture::new();
        let doc = fx.write("docs/a.md", "# A\n");
        let readme = fx.write("README.md", "See [a](docs/a.md).\n");

        let plan = fx
            .builder()
            .build(delete(DeleteTarget::File {
                path: "docs/a.md".into(),
            }))
            .await
            .unwrap()
            .into_plan()
            .unwrap();

        assert_eq!(
            plan.edit.file_operations,
            vec![FileOperation::Delete { path: doc.clone() }]
        );
        assert!(plan.edit.changes.is_empty());
        assert!(plan.has_warning(warning_codes::DANGLING_REFERENCES));
        assert_eq!(plan.impact.dependent_files, vec![readme]);
        assert!(plan.file_checksums.contains_key(&doc));
    }

    #[tokio::test]
    async fn test_delete_directory_lists_every_file() {
        let fx = Fixture::new();
        let a = fx.write("old/a.md", "a\n");
        let b = fx.write("old/nested/b.md", "b\n");

        let plan = fx
            .builder()
            .build(delete(DeleteTarget::Directory { path: "old".into() }))
            .await
            .unwrap()
            .into_plan()
            .unwrap();

        assert_eq!(
            plan.edit.file_operations,
            vec![
                FileOperation::Delete { path: a },
                FileOperation::Delete { path: b },
            ]
        );
        assert!(plan.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_delete_kind_mismatch() {
        let fx = Fixture::new();
        fx.write("old/a.md", "a\n");
        let err = fx
            .builder()
            .build(delete(DeleteTarget::File { path: "old".into() }))
            .await
            .unwrap_err();
        assert!(matches!(err, RefitError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn test_delete_symbol_reports_remaining_references() {
        let fx = Fixture::new();
        let lib = fx.write("lib.tst", "fn gone\nfn kept\n");
        let user = fx.write("user.tst", "use gone\n");

        let mut intelligence = MockIntelligence::new();
        let (lib_ref, user_ref) = (lib.clone(), user.clone());
        intelligence.expect_find_references().returning(move |_, _| {
            Ok(vec![
                Location {
                    path: lib_ref.clone(),
                    range: EditLocation::on_line(0, 3, 4),
                },
                Location {
                    path: user_ref.clone(),
                    range: EditLocation::on_line(0, 4, 4),
                },
            ])
        });
        let registry = PluginRegistry::new().with_plugin(Arc::new(TestPlugin(LineDeleter)));

        let plan = fx
            .builder_full(registry, Arc::new(intelligence))
            .build(delete(DeleteTarget::Symbol {
                file: lib.clone(),
                position: Position::new(0, 3),
            }))
            .await
            .unwrap()
            .into_plan()
            .unwrap();

        assert_eq!(plan.edit.changes[&lib][0].original_text, "fn gone\n");
        assert!(plan.has_warning(warning_codes::DANGLING_REFERENCES));
        assert_eq!(plan.impact.dependent_files, vec![user]);
    }

    #[tokio::test]
    async fn test_delete_symbol_without_provider_is_not_supported() {
        let fx = Fixture::new();
        let file = fx.write("notes.md", "text\n");
        let err = fx
            .builder()
            .build(delete(DeleteTarget::Symbol {
                file,
                position: Position::new(0, 0),
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, RefitError::NotSupported { .. }));
    }
}
