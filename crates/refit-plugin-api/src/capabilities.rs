//! Capability traits for language-aware refactorings
//!
//! A plugin that can analyse code well enough to extract, inline or delete
//! exposes a `RefactoringProvider`. Every method defaults to
//! `PluginApiError::NotSupported`, so a provider implements only what it can
//! do safely and the engine reports the rest as unsupported instead of guessing.

use crate::{PluginApiError, PluginResult};
use async_trait::async_trait;
use refit_foundation::{EditLocation, Position, WorkspaceEdit};
use std::path::PathBuf;

/// Parameters for extract function / variable refactoring
#[derive(Debug, Clone)]
pub struct ExtractParams {
    /// Source file path
    pub file_path: PathBuf,
    /// Selected range (0-based)
    pub range: EditLocation,
    /// Name for the extracted function or variable
    pub name: String,
}

/// Parameters for inline variable / function refactoring
#[derive(Debug, Clone)]
pub struct InlineParams {
    /// Source file path
    pub file_path: PathBuf,
    /// Position of the declaration or a usage (0-based)
    pub position: Position,
}

/// Parameters for symbol delete refactoring
#[derive(Debug, Clone)]
pub struct DeleteSymbolParams {
    /// Source file path
    pub file_path: PathBuf,
    /// Position of the symbol's declaration (0-based)
    pub position: Position,
}

/// Capability for providing refactoring operations
///
/// # Example
///
/// ```rust,ignore
/// if let Some(provider) = plugin.refactoring_provider() {
///     if provider.supports_inline_variable() {
///         let edit = provider.plan_inline_variable(source, &params).await?;
///         // Merge into a plan...
///     }
/// }
/// ```
#[async_trait]
pub trait RefactoringProvider: Send + Sync {
    /// Check if extract function refactoring is supported
    fn supports_extract_function(&self) -> bool {
        false
    }

    /// Plan extract function refactoring
    ///
    /// Returns edits against `source` only; nothing is written.
    async fn plan_extract_function(
        &self,
        _source: &str,
        _params: &ExtractParams,
    ) -> PluginResult<WorkspaceEdit> {
        Err(PluginApiError::not_supported("plan_extract_function"))
    }

    /// Check if extract variable refactoring is supported
    fn supports_extract_variable(&self) -> bool {
        false
    }

    async fn plan_extract_variable(
        &self,
        _source: &str,
        _params: &ExtractParams,
    ) -> PluginResult<WorkspaceEdit> {
        Err(PluginApiError::not_supported("plan_extract_variable"))
    }

    /// Check if extract constant refactoring is supported
    fn supports_extract_constant(&self) -> bool {
        false
    }

    async fn plan_extract_constant(
        &self,
        _source: &str,
        _params: &ExtractParams,
    ) -> PluginResult<WorkspaceEdit> {
        Err(PluginApiError::not_supported("plan_extract_constant"))
    }

    /// Check if inline variable refactoring is supported
    fn supports_inline_variable(&self) -> bool {
        false
    }

    /// Plan inline variable refactoring
    ///
    /// The declaration is removed and each usage in the same scope is replaced
    /// by the initializer.
    async fn plan_inline_variable(
        &self,
        _source: &str,
        _params: &InlineParams,
    ) -> PluginResult<WorkspaceEdit> {
        Err(PluginApiError::not_supported("plan_inline_variable"))
    }

    /// Check if inline function refactoring is supported
    fn supports_inline_function(&self) -> bool {
        false
    }

    async fn plan_inline_function(
        &self,
        _source: &str,
        _params: &InlineParams,
    ) -> PluginResult<WorkspaceEdit> {
        Err(PluginApiError::not_supported("plan_inline_function"))
    }

    /// Check if symbol delete refactoring is supported
    fn supports_symbol_delete(&self) -> bool {
        false
    }

    /// Plan removal of the declaration at `params.position`
    async fn plan_delete_symbol(
        &self,
        _source: &str,
        _params: &DeleteSymbolParams,
    ) -> PluginResult<WorkspaceEdit> {
        Err(PluginApiError::not_supported("plan_delete_symbol"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ExtractOnly;

    #[async_trait]
    impl RefactoringProvider for ExtractOnly {
        fn supports_extract_variable(&self) -> bool {
            true
        }

        async fn plan_extract_variable(
            &self,
            _source: &str,
            _params: &ExtractParams,
        ) -> PluginResult<WorkspaceEdit> {
            Ok(WorkspaceEdit::new())
        }
    }

    #[tokio::test]
    async fn test_unimplemented_capabilities_are_not_supported() {
        let provider = ExtractOnly;
        let inline = InlineParams {
            file_path: "/p/a.ts".into(),
            position: Position::new(0, 0),
        };
        assert!(!provider.supports_inline_variable());
        let err = provider.plan_inline_variable("", &inline).await.unwrap_err();
        assert!(matches!(err, PluginApiError::NotSupported { .. }));

        let extract = ExtractParams {
            file_path: "/p/a.ts".into(),
            range: EditLocation::on_line(0, 0, 1),
            name: "x".into(),
        };
        assert!(provider.plan_extract_variable("a", &extract).await.is_ok());
    }
}
