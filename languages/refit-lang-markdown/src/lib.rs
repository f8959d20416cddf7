//! Markdown Language Plugin
//!
//! Tracks file links in `.md`, `.markdown` and `.mdx` documents so moves
//! and renames keep documentation pointing at the right files.

mod code_regions;
mod import_support_impl;

pub use import_support_impl::MarkdownImportSupport;

use refit_plugin_api::{
    ImportMoveSupport, ImportParser, ImportRenameSupport, LanguageMetadata, LanguagePlugin,
};

/// Markdown language plugin
pub struct MarkdownPlugin {
    metadata: LanguageMetadata,
    import_support: MarkdownImportSupport,
}

impl MarkdownPlugin {
    pub fn new() -> Self {
        Self {
            metadata: LanguageMetadata::MARKDOWN,
            import_support: MarkdownImportSupport::new(),
        }
    }
}

impl Default for MarkdownPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguagePlugin for MarkdownPlugin {
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
}
