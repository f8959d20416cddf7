//! Static language metadata

/// Static metadata describing a language plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageMetadata {
    /// Display name (e.g., "TypeScript")
    pub name: &'static str,
    /// File extensions handled, without the leading dot
    pub extensions: &'static [&'static str],
}

impl LanguageMetadata {
    pub const TYPESCRIPT: Self = Self {
        name: "TypeScript",
        extensions: &["ts", "tsx", "js", "jsx", "mjs", "cjs", "mts", "cts"],
    };

    pub const MARKDOWN: Self = Self {
        name: "Markdown",
        extensions: &["md", "markdown", "mdx"],
    };
}
