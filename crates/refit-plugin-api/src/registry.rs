//! Plugin registry keyed by file extension

use crate::{ImportMoveSupport, ImportParser, ImportRenameSupport, LanguagePlugin, RefactoringProvider};
use std::path::Path;
use std::sync::Arc;

/// Registry of language plugins.
///
/// Lookup is by extension; when several plugins claim the same extension the
/// first registered one wins.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn LanguagePlugin>>,
}

impl PluginRegistry {
    /// Create a new empty plugin registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new language plugin
    pub fn register(&mut self, plugin: Arc<dyn LanguagePlugin>) {
        tracing::debug!(
            plugin = plugin.metadata().name,
            extensions = ?plugin.metadata().extensions,
            "Registered language plugin"
        );
        self.plugins.push(plugin);
    }

    pub fn with_plugin(mut self, plugin: Arc<dyn LanguagePlugin>) -> Self {
        self.register(plugin);
        self
    }

    /// Find a plugin that handles the given file extension
    pub fn find_by_extension(&self, extension: &str) -> Option<&dyn LanguagePlugin> {
        self.plugins
            .iter()
            .find(|p| p.handles_extension(extension))
            .map(|arc| arc.as_ref())
    }

    /// Find the plugin responsible for `path`, by its extension
    pub fn plugin_for_path(&self, path: &Path) -> Option<&dyn LanguagePlugin> {
        let extension = path.extension().and_then(|ext| ext.to_str())?;
        self.find_by_extension(extension)
    }

    pub fn import_parser_for(&self, path: &Path) -> Option<&dyn ImportParser> {
        self.plugin_for_path(path)?.import_parser()
    }

    pub fn import_move_support_for(&self, path: &Path) -> Option<&dyn ImportMoveSupport> {
        self.plugin_for_path(path)?.import_move_support()
    }

    pub fn import_rename_support_for(&self, path: &Path) -> Option<&dyn ImportRenameSupport> {
        self.plugin_for_path(path)?.import_rename_support()
    }

    /// Get the refactoring provider capability for a specific file
    pub fn refactoring_provider_for(&self, path: &Path) -> Option<&dyn RefactoringProvider> {
        self.plugin_for_path(path)?.refactoring_provider()
    }

    /// Get all registered plugins
    pub fn all(&self) -> &[Arc<dyn LanguagePlugin>] {
        &self.plugins
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Every extension claimed by some plugin
    pub fn extensions(&self) -> Vec<&'static str> {
        let mut exts: Vec<&'static str> = Vec::new();
        for plugin in &self.plugins {
            for ext in plugin.metadata().extensions {
                if !exts.contains(ext) {
                    exts.push(ext);
                }
            }
        }
        exts
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field(
                "plugins",
                &self
                    .plugins
                    .iter()
                    .map(|p| p.metadata().name)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ImportKind, ImportRef, LanguageMetadata};

    struct Named(LanguageMetadata);

    impl LanguagePlugin for Named {
        fn metadata(&self) -> &LanguageMetadata {
            &self.0
        }
    }

    struct WithParser(LanguageMetadata);

    impl ImportParser for WithParser {
        fn parse_imports(&self, _content: &str) -> Vec<ImportRef> {
            vec![ImportRef::new("./x", ImportKind::Import)]
        }
    }

    impl LanguagePlugin for WithParser {
        fn metadata(&self) -> &LanguageMetadata {
            &self.0
        }

        fn import_parser(&self) -> Option<&dyn ImportParser> {
            Some(self)
        }
    }

    #[test]
    fn test_first_registered_plugin_wins() {
        let registry = PluginRegistry::new()
            .with_plugin(Arc::new(Named(LanguageMetadata {
                name: "First",
                extensions: &["ts"],
            })))
            .with_plugin(Arc::new(WithParser(LanguageMetadata {
                name: "Second",
                extensions: &["ts", "js"],
            })));

        let ts = registry.find_by_extension("ts").unwrap();
        assert_eq!(ts.metadata().name, "First");
        assert!(registry.import_parser_for(Path::new("/p/a.ts")).is_none());
        assert!(registry.import_parser_for(Path::new("/p/a.js")).is_some());
        assert_eq!(registry.extensions(), vec!["ts", "js"]);
    }

    #[test]
    fn test_unknown_extension_has_no_plugin() {
        let registry = PluginRegistry::new();
        assert!(registry.plugin_for_path(Path::new("/p/notes.txt")).is_none());
        assert!(registry.plugin_for_path(Path::new("/p/Makefile")).is_none());
        assert!(registry.is_empty());
    }
}
