//! TypeScript/JavaScript Language Plugin
//!
//! Provides support for `.ts`, `.tsx`, `.js`, `.jsx`, `.mjs`, `.cjs`,
//! `.mts` and `.cts` files. Tracks ES module imports, re-exports, `require`
//! and dynamic `import()` specifiers, and offers extract, inline variable and
//! symbol delete refactorings.

mod import_support;
mod parser;
mod refactoring;
mod regex_patterns;

pub use import_support::TypeScriptImportSupport;
pub use refactoring::TypeScriptRefactoringProvider;

use refit_plugin_api::{
    ImportMoveSupport, ImportParser, ImportRenameSupport, LanguageMetadata, LanguagePlugin,
    RefactoringProvider,
};

/// TypeScript language plugin
pub struct TypeScriptPlugin {
    metadata: LanguageMetadata,
    import_support: TypeScriptImportSupport,
    refactoring: TypeScriptRefactoringProvider,
}

impl TypeScriptPlugin {
    pub fn new() -> Self {
        Self {
            metadata: LanguageMetadata::TYPESCRIPT,
            import_support: TypeScriptImportSupport::new(),
            refactoring: TypeScriptRefactoringProvider::new(),
        }
    }
}

impl Default for TypeScriptPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguagePlugin for TypeScriptPlugin {
    fn metadata(&self) -> &LanguageMetadata {
        &self.metadata
    }

    fn import_parser(&self) -> Option<&dyn ImportParser> {
        Some(&self.import_support)
    }

    fn import_rename_support(&self) -> Option<&dyn ImportRenameSupport> {
        Some(&self.import_support)
    }

    fn import_move_support(&self) -> Option<&dyn ImportMoveSupport> {
        Some(&self.import_support)
    }

    fn refactoring_provider(&self) -> Option<&dyn RefactoringProvider> {
        Some(&self.refactoring)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refit_foundation::{EditLocation, TextEdit};
    use refit_plugin_api::{ExtractParams, PluginRegistry};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    #[test]
    fn test_plugin_claims_typescript_extensions() {
        let registry = PluginRegistry::new().with_plugin(Arc::new(TypeScriptPlugin::new()));
        for file in ["a.ts", "a.tsx", "a.js", "a.mjs", "a.cjs"] {
            assert!(registry.import_parser_for(Path::new(file)).is_some(), "{}", file);
        }
        assert!(registry.plugin_for_path(Path::new("a.md")).is_none());
    }

    #[tokio::test]
    async fn test_provider_through_plugin() {
        let plugin = TypeScriptPlugin::new();
        let provider = plugin.refactoring_provider().unwrap();
        let source = "const v = 1 + 2;\n";
        let params = ExtractParams {
            file_path: PathBuf::from("/p/a.ts"),
            range: EditLocation::on_line(0, 10, 5),
            name: "sum".to_string(),
        };
        let edit = provider.plan_extract_variable(source, &params).await.unwrap();
        let edits: &Vec<TextEdit> = &edit.changes[Path::new("/p/a.ts")];
        assert_eq!(edits[0].new_text, "const sum = 1 + 2;\n");
        assert_eq!(edits[1].new_text, "sum");
    }
}
