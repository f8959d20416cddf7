//! Extract and inline, delegated to the language's refactoring provider

use super::symbol::is_valid_identifier;
use super::{Draft, PlanBuilder};
use refit_foundation::{
    EditLocation, ExtractKind, InlineKind, Position, RefitError, RefitResult, WorkspaceEdit,
};
use refit_plugin_api::{ExtractParams, InlineParams, RefactoringProvider};
use std::path::Path;
use tracing::info;

fn unsupported(operation: &str, file: &Path) -> RefitError {
    RefitError::NotSupported {
        operation: operation.to_string(),
        reason: Some(format!(
            "No language capability for {} files",
            file.extension()
                .and_then(|e| e.to_str())
                .unwrap_or("extension-less")
        )),
    }
}

impl PlanBuilder {
    fn provider_for(&self, operation: &str, file: &Path) -> RefitResult<&dyn RefactoringProvider> {
        self.registry
            .refactoring_provider_for(file)
            .ok_or_else(|| unsupported(operation, file))
    }

    pub(super) async fn plan_extract(
        &self,
        kind: ExtractKind,
        file: &Path,
        range: EditLocation,
        name: &str,
    ) -> RefitResult<Draft> {
        self.ensure_in_root(file)?;
        if !is_valid_identifier(name) {
            return Err(RefitError::invalid_request(format!(
                "'{}' is not a valid identifier",
                name
            )));
        }

        let operation = match kind {
            ExtractKind::Function => "extract_function",
            ExtractKind::Variable => "extract_variable",
            ExtractKind::Constant => "extract_constant",
        };
        let provider = self.provider_for(operation, file)?;
        let supported = match kind {
            ExtractKind::Function => provider.supports_extract_function(),
            ExtractKind::Variable => provider.supports_extract_variable(),
            ExtractKind::Constant => provider.supports_extract_constant(),
        };
        if !supported {
            return Err(unsupported(operation, file));
        }

        info!(file_path = %file.display(), operation, name, "Planning extract");
        let source = self.read(file).await?;
        let params = ExtractParams {
            file_path: file.to_path_buf(),
            range,
            name: name.to_string(),
        };
        let edit = match kind {
            ExtractKind::Function => provider.plan_extract_function(&source, &params).await?,
            ExtractKind::Variable => provider.plan_extract_variable(&source, &params).await?,
            ExtractKind::Constant => provider.plan_extract_constant(&source, &params).await?,
        };
        Ok(self.single_file_draft(file, edit))
    }

    pub(super) async fn plan_inline(
        &self,
        kind: InlineKind,
        file: &Path,
        position: Position,
    ) -> RefitResult<Draft> {
        self.ensure_in_root(file)?;
        let operation = match kind {
            InlineKind::Variable => "inline_variable",
            InlineKind::Function => "inline_function",
        };
        let provider = self.provider_for(operation, file)?;
        let supported = match kind {
            InlineKind::Variable => provider.supports_inline_variable(),
            InlineKind::Function => provider.supports_inline_function(),
        };
        if !supported {
            return Err(unsupported(operation, file));
        }

        info!(file_path = %file.display(), operation, "Planning inline");
        let source = self.read(file).await?;
        let params = InlineParams {
            file_path: file.to_path_buf(),
            position,
        };
        let edit = match kind {
            InlineKind::Variable => provider.plan_inline_variable(&source, &params).await?,
            InlineKind::Function => provider.plan_inline_function(&source, &params).await?,
        };
        Ok(self.single_file_draft(file, edit))
    }

    fn single_file_draft(&self, file: &Path, edit: WorkspaceEdit) -> Draft {
        let mut draft = Draft::new(edit);
        draft.dependents = vec![file.to_path_buf()];
        draft
    }
}
