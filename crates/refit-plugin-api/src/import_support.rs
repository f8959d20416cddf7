//! Import capability traits
//!
//! Each trait is independently optional. The reference updater prefers
//! `ImportParser` references that carry a location (exact span edits), then
//! `ImportMoveSupport` whole-content rewrites, then its generic detector.

use crate::specifier::{self, SpecifierRequest};
use refit_foundation::EditLocation;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    /// `import ... from '...'` or a side-effect `import '...'`
    Import,
    /// `export ... from '...'`
    ReExport,
    /// `require('...')`
    Require,
    /// `import('...')`
    DynamicImport,
    /// Markdown inline, reference-style or autolink
    Link,
}

/// One reference to another file, as written in the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRef {
    /// Specifier text without quotes, including any `#anchor` or `?query`
    pub specifier: String,
    pub kind: ImportKind,
    /// Span of `specifier` in the content, when the parser tracks positions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<EditLocation>,
}

impl ImportRef {
    pub fn new(specifier: impl Into<String>, kind: ImportKind) -> Self {
        Self {
            specifier: specifier.into(),
            kind,
            location: None,
        }
    }

    pub fn at(mut self, location: EditLocation) -> Self {
        self.location = Some(location);
        self
    }
}

/// Parses file references out of source content
pub trait ImportParser: Send + Sync {
    fn parse_imports(&self, content: &str) -> Vec<ImportRef>;

    fn contains_import(&self, content: &str, module: &str) -> bool {
        self.parse_imports(content)
            .iter()
            .any(|imp| imp.specifier == module)
    }
}

/// Rewrites references when a module is renamed in place
pub trait ImportRenameSupport: Send + Sync {
    /// Returns the rewritten content and the number of references changed
    fn rewrite_imports_for_rename(
        &self,
        content: &str,
        old_name: &str,
        new_name: &str,
    ) -> (String, usize);
}

/// Rewrites references when a file moves
pub trait ImportMoveSupport: Send + Sync {
    /// Rewrite every reference in `content` (owned by `importing_file`) that
    /// points at `old_path` so it points at `new_path`.
    fn rewrite_imports_for_move(
        &self,
        content: &str,
        importing_file: &Path,
        old_path: &Path,
        new_path: &Path,
    ) -> (String, usize);

    /// Format a specifier for `request.target` in the style of `request.original`
    fn format_specifier(&self, request: &SpecifierRequest<'_>) -> String {
        specifier::format_specifier(request)
    }
}
