//! Code intelligence seam used by the plan builder

use async_trait::async_trait;
use refit_foundation::{
    Diagnostic, Location, Position, RefitError, RefitResult, SymbolCandidate, WorkspaceEdit,
};
use std::path::Path;

/// Symbol-level queries answered by an external service.
///
/// Reference locations returned here are the only source of truth for symbol
/// renames. Implementations must never write to the workspace.
#[async_trait]
pub trait CodeIntelligence: Send + Sync {
    /// Every reference to the symbol at `position`, declaration included.
    async fn find_references(&self, file: &Path, position: Position) -> RefitResult<Vec<Location>>;

    /// Edits the service would make to rename the symbol at `position`.
    async fn rename_symbol(
        &self,
        file: &Path,
        position: Position,
        new_name: &str,
    ) -> RefitResult<WorkspaceEdit>;

    /// Symbols named exactly `name` across the workspace.
    async fn find_symbols(&self, name: &str) -> RefitResult<Vec<SymbolCandidate>>;

    async fn get_diagnostics(&self, file: &Path) -> RefitResult<Vec<Diagnostic>>;

    /// Restart the services for `extensions`, or all of them when `None`.
    async fn restart(&self, extensions: Option<Vec<String>>) -> RefitResult<()>;

    async fn shutdown(&self) -> RefitResult<()>;
}

/// Stand-in used when no language server is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCodeIntelligence;

impl NoCodeIntelligence {
    fn unavailable<T>() -> RefitResult<T> {
        Err(RefitError::unavailable(
            "lsp",
            "No language server is configured for this workspace",
        ))
    }
}

#[async_trait]
impl CodeIntelligence for NoCodeIntelligence {
    async fn find_references(&self, _file: &Path, _position: Position) -> RefitResult<Vec<Location>> {
        Self::unavailable()
    }

    async fn rename_symbol(
        &self,
        _file: &Path,
        _position: Position,
        _new_name: &str,
    ) -> RefitResult<WorkspaceEdit> {
        Self::unavailable()
    }

    async fn find_symbols(&self, _name: &str) -> RefitResult<Vec<SymbolCandidate>> {
        Self::unavailable()
    }

    async fn get_diagnostics(&self, _file: &Path) -> RefitResult<Vec<Diagnostic>> {
        Ok(Vec::new())
    }

    async fn restart(&self, _extensions: Option<Vec<String>>) -> RefitResult<()> {
        Ok(())
    }

    async fn shutdown(&self) -> RefitResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_code_intelligence_is_unavailable() {
        let service = NoCodeIntelligence;
        let err = service
            .find_references(Path::new("/p/a.ts"), Position::new(0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, RefitError::Unavailable { .. }));
        assert!(service.get_diagnostics(Path::new("/p/a.ts")).await.unwrap().is_empty());
    }
}
