//! Import support implementation for Markdown
//!
//! Treats markdown file links as "imports" for the purpose of file move
//! tracking: inline links and images, reference-style definitions and
//! autolinks. Links inside code or HTML comments are ignored.

use crate::code_regions::CodeRegions;
use refit_foundation::{position_at, EditLocation};
use refit_plugin_api::specifier::split_suffix;
use refit_plugin_api::{
    ImportKind, ImportMoveSupport, ImportParser, ImportRef, ImportRenameSupport, SpecifierBase,
    SpecifierRequest, SpecifierStyle,
};
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

/// `[text](target "title")` and `![alt](target)`; group 1 is the target
static INLINE_LINK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!?\[[^\]]*\]\(\s*(<[^>\n]+>|[^)\s]+)(?:\s+(?:"[^"]*"|'[^']*'))?\s*\)"#).unwrap()
});

/// `[label]: target`; group 1 is the target
static REF_DEFINITION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ ]{0,3}\[[^\]]+\]:[ \t]*(<[^>\n]+>|\S+)").unwrap()
});

/// `<target>`
static AUTOLINK_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<([^<>\s]+)>").unwrap());

/// Import support for markdown files
pub struct MarkdownImportSupport;

impl MarkdownImportSupport {
    pub fn new() -> Self {
        Self
    }

    /// Check if a link target looks like a file reference (not a URL or anchor)
    fn is_file_reference(target: &str) -> bool {
        const SCHEMES: &[&str] = &["mailto:", "tel:", "data:", "javascript:"];
        !target.is_empty()
            && !target.starts_with('#')
            && !target.starts_with("//")
            && !target.contains("://")
            && !SCHEMES.iter().any(|s| target.starts_with(s))
    }

    /// Autolinks are only file references when they name a file, not an
    /// HTML tag or an email address.
    fn is_file_autolink(target: &str) -> bool {
        Self::is_file_reference(target) && !target.contains('@') && target.contains('.')
    }
}

impl Default for MarkdownImportSupport {
    fn default() -> Self {
        Self::new()
    }
}

/// One link target and its byte span in the document
#[derive(Debug, Clone, PartialEq, Eq)]
struct LinkTarget {
    target: String,
    start: usize,
    end: usize,
}

fn scan_links(content: &str) -> Vec<LinkTarget> {
    let code = CodeRegions::scan(content);
    let mut links = Vec::new();

    let mut collect = |regex: &Regex, accept: fn(&str) -> bool| {
        for caps in regex.captures_iter(content) {
            let (Some(whole), Some(group)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if code.contains(whole.start()) {
                continue;
            }
            let (mut start, mut end) = (group.start(), group.end());
            let mut target = group.as_str();
            if let Some(inner) = target.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
                target = inner;
                start += 1;
                end -= 1;
            }
            if accept(target) {
                links.push(LinkTarget {
                    target: target.to_string(),
                    start,
                    end,
                });
            }
        }
    };

    collect(&*INLINE_LINK_REGEX, MarkdownImportSupport::is_file_reference);
    collect(&*REF_DEFINITION_REGEX, MarkdownImportSupport::is_file_reference);
    collect(&*AUTOLINK_REGEX, MarkdownImportSupport::is_file_autolink);

    // An autolink match inside an inline link's `<target>` is the same link
    links.sort_by_key(|link| link.start);
    links.dedup_by(|b, a| b.start < a.end);
    links
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

impl ImportParser for MarkdownImportSupport {
    fn parse_imports(&self, content: &str) -> Vec<ImportRef> {
        scan_links(content)
            .into_iter()
            .map(|link| {
                let start = position_at(content, link.start);
                let end = position_at(content, link.end);
                ImportRef::new(link.target, ImportKind::Link).at(EditLocation::new(
                    start.line,
                    start.character,
                    end.line,
                    end.character,
                ))
            })
            .collect()
    }
}

impl ImportRenameSupport for MarkdownImportSupport {
    fn rewrite_imports_for_rename(
        &self,
        content: &str,
        old_name: &str,
        new_name: &str,
    ) -> (String, usize) {
        let mut result = content.to_string();
        let mut count = 0;
        let old = old_name.trim_start_matches("./");
        let nested = format!("{}/", old);

        for link in scan_links(content).into_iter().rev() {
            let (path, suffix) = split_suffix(&link.target);
            let (dot, clean) = match path.strip_prefix("./") {
                Some(rest) => ("./", rest),
                None => ("", path),
            };
            let renamed = if clean == old {
                new_name.to_string()
            } else if let Some(rest) = clean.strip_prefix(&nested) {
                format!("{}/{}", new_name, rest)
            } else {
                continue;
            };
            result.replace_range(link.start..link.end, &format!("{}{}{}", dot, renamed, suffix));
            count += 1;
        }

        if count > 0 {
            debug!(changes = count, old_name, new_name, "Rewrote markdown links for rename");
        }
        (result, count)
    }
}

impl ImportMoveSupport for MarkdownImportSupport {
    fn rewrite_imports_for_move(
        &self,
        content: &str,
        importing_file: &Path,
        old_path: &Path,
        new_path: &Path,
    ) -> (String, usize) {
        let base = importing_file.parent().unwrap_or(Path::new("/"));
        let mut result = content.to_string();
        let mut count = 0;

        for link in scan_links(content).into_iter().rev() {
            let (path, _) = split_suffix(&link.target);
            // Root-relative links need the project root; the reference updater resolves those.
            if path.is_empty() || path.starts_with('/') {
                continue;
            }
            if normalize(&base.join(path)) != old_path {
                continue;
            }
            let style = SpecifierStyle::infer(&link.target, SpecifierBase::ImportingFile, old_path);
            let rewritten = self.format_specifier(&SpecifierRequest {
                importing_file,
                project_root: base,
                target: new_path,
                original: &link.target,
                style: &style,
            });
            if rewritten != link.target {
                result.replace_range(link.start..link.end, &rewritten);
                count += 1;
            }
        }

        debug!(changes = count, old_path = ?old_path, new_path = ?new_path, "Rewrote markdown links for move");
        (result, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn targets(content: &str) -> Vec<String> {
        MarkdownImportSupport::new()
            .parse_imports(content)
            .into_iter()
            .map(|r| r.specifier)
            .collect()
    }

    #[test]
    fn test_parse_imports() {
        let content = r#"# Guide

See [setup](docs/setup.md#install "Setup") and ![diagram](./img/flow.png).
Also <notes/todo.md> and [external](https://example.com) and [top](#top).
Mail <someone@example.com> or <br/>.

[ref]: ../shared/ref.md
[site]: https://example.com
"#;
        assert_eq!(
            targets(content),
            vec![
                "docs/setup.md#install",
                "./img/flow.png",
                "notes/todo.md",
                "../shared/ref.md",
            ]
        );
    }

    #[test]
    fn test_parse_records_span_of_target() {
        let content = "x [a](<docs/a b.md>) y\n";
        let refs = MarkdownImportSupport::new().parse_imports(content);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].specifier, "docs/a b.md");
        assert_eq!(refs[0].kind, ImportKind::Link);
        assert_eq!(refs[0].location, Some(EditLocation::on_line(0, 7, 11)));
    }

    #[test]
    fn test_links_in_code_are_ignored() {
        let content = "Real [a](a.md).\n\n```md\n[b](b.md)\n```\n\nInline `[c](c.md)` and <!-- [d](d.md) -->\n";
        assert_eq!(targets(content), vec!["a.md"]);
    }

    #[test]
    fn test_rewrite_imports_for_move() {
        let support = MarkdownImportSupport::new();
        let content = "[a](docs/a.md#usage) [same](./docs/a.md) [b](docs/b.md)\n";
        let (result, count) = support.rewrite_imports_for_move(
            content,
            Path::new("/p/README.md"),
            Path::new("/p/docs/a.md"),
            Path::new("/p/guide/a.md"),
        );
        assert_eq!(count, 2);
        assert_eq!(
            result,
            "[a](guide/a.md#usage) [same](./guide/a.md) [b](docs/b.md)\n"
        );
    }

    #[test]
    fn test_rewrite_for_move_climbs_out_of_directory() {
        let support = MarkdownImportSupport::new();
        let content = "[api](../api.md)\n";
        let (result, count) = support.rewrite_imports_for_move(
            content,
            Path::new("/p/docs/guide.md"),
            Path::new("/p/api.md"),
            Path::new("/p/docs/reference/api.md"),
        );
        assert_eq!(count, 1);
        assert_eq!(result, "[api](./reference/api.md)\n");
    }

    #[test]
    fn test_rewrite_imports_for_rename() {
        let support = MarkdownImportSupport::new();
        let content = "[a](old/a.md) [b](./old/b.md#x) [c](older/c.md)\n";
        let (result, count) = support.rewrite_imports_for_rename(content, "old", "new");
        assert_eq!(count, 2);
        assert_eq!(result, "[a](new/a.md) [b](./new/b.md#x) [c](older/c.md)\n");
    }
}
