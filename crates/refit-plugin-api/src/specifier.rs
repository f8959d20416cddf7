//! Style-preserving specifier formatting
//!
//! A rewritten reference keeps the shape of the one it replaces: relative
//! stays relative, root-relative stays root-relative, an omitted extension
//! stays omitted and a directory import that resolved through `index.*`
//! keeps pointing at the directory. Anchors and query suffixes are carried over.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// What a specifier is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecifierBase {
    ImportingFile,
    ProjectRoot,
}

/// How the specifier starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecifierPrefix {
    /// `./` or `../`
    Dot,
    /// `/` (root-relative)
    Slash,
    /// neither, e.g. `docs/guide.md` in a markdown link
    Bare,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecifierStyle {
    pub base: SpecifierBase,
    pub prefix: SpecifierPrefix,
    pub explicit_extension: bool,
    /// The specifier named a directory and resolved through its index file
    pub index: bool,
    /// `#anchor` or `?query` tail, kept verbatim
    pub suffix: String,
}

impl SpecifierStyle {
    /// Infer the style of `original`, which resolved against `base` to `resolved_target`.
    pub fn infer(original: &str, base: SpecifierBase, resolved_target: &Path) -> Self {
        let (path_part, suffix) = split_suffix(original);

        let prefix = if path_part.starts_with("./")
            || path_part.starts_with("../")
            || path_part == "."
            || path_part == ".."
        {
            SpecifierPrefix::Dot
        } else if path_part.starts_with('/') {
            SpecifierPrefix::Slash
        } else {
            SpecifierPrefix::Bare
        };

        let last = path_part
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("");
        let target_name = resolved_target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let target_stem = resolved_target
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let explicit_extension = last.eq_ignore_ascii_case(&target_name)
            && resolved_target.extension().is_some();
        let index = target_stem == "index"
            && !last.eq_ignore_ascii_case(&target_name)
            && !last.eq_ignore_ascii_case(&target_stem);

        Self {
            base,
            prefix,
            explicit_extension,
            index,
            suffix: suffix.to_string(),
        }
    }
}

/// Everything needed to format a specifier for a new target.
#[derive(Debug, Clone, Copy)]
pub struct SpecifierRequest<'a> {
    pub importing_file: &'a Path,
    pub project_root: &'a Path,
    pub target: &'a Path,
    pub original: &'a str,
    pub style: &'a SpecifierStyle,
}

/// Split `path#anchor` / `path?query` into the path and its suffix.
pub fn split_suffix(specifier: &str) -> (&str, &str) {
    match specifier.find(['#', '?']) {
        Some(idx) => specifier.split_at(idx),
        None => (specifier, ""),
    }
}

/// Render a path with forward slashes regardless of platform.
pub fn to_forward_slashes(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            Component::ParentDir => Some("..".to_string()),
            Component::CurDir => Some(".".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Format a specifier pointing at `request.target` in the style of the original.
pub fn format_specifier(request: &SpecifierRequest<'_>) -> String {
    let style = request.style;

    let referenced: PathBuf = if style.index && is_index_file(request.target) {
        request
            .target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| request.target.to_path_buf())
    } else if !style.explicit_extension {
        request.target.with_extension("")
    } else {
        request.target.to_path_buf()
    };

    let base = match style.base {
        SpecifierBase::ImportingFile => request
            .importing_file
            .parent()
            .unwrap_or(request.project_root),
        SpecifierBase::ProjectRoot => request.project_root,
    };

    let relative = pathdiff::diff_paths(&referenced, base).unwrap_or_else(|| referenced.clone());
    let relative = to_forward_slashes(&relative);
    let climbs = relative.starts_with("..");

    let mut out = match style.prefix {
        SpecifierPrefix::Dot if climbs => relative,
        SpecifierPrefix::Dot if relative.is_empty() => ".".to_string(),
        SpecifierPrefix::Dot => format!("./{}", relative),
        SpecifierPrefix::Slash => format!("/{}", relative),
        SpecifierPrefix::Bare => relative,
    };
    out.push_str(&style.suffix);
    out
}

fn is_index_file(path: &Path) -> bool {
    path.file_stem().and_then(|s| s.to_str()) == Some("index")
}
