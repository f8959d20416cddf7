//! Plugin-backed reference detection
//!
//! Plugins with a locating `ImportParser` give exact spans. Plugins that only
//! rewrite whole files have their output diffed back into per-line edits.

use refit_foundation::{position_at, utf16_len, EditLocation, EditType, TextEdit};
use refit_plugin_api::{ImportKind, ImportParser, ImportRef};

/// Whether a parsed import is a filesystem path this engine should track.
/// Package imports (`react`, `@scope/pkg`) are left alone; links may be bare.
pub fn is_path_reference(import: &ImportRef) -> bool {
    match import.kind {
        ImportKind::Link => true,
        _ => import.specifier.starts_with('.') || import.specifier.starts_with('/'),
    }
}

/// Path references from a parser, or `None` when any of them lacks a location.
pub fn located_refs(parser: &dyn ImportParser, content: &str) -> Option<Vec<ImportRef>> {
    let refs: Vec<ImportRef> = parser
        .parse_imports(content)
        .into_iter()
        .filter(is_path_reference)
        .collect();
    if refs.iter().any(|r| r.location.is_none()) {
        return None;
    }
    Some(refs)
}

/// Minimal edits turning `original` into `rewritten`.
///
/// With an unchanged line count every differing line becomes one edit;
/// otherwise a single edit replaces the whole content.
pub fn line_edits(original: &str, rewritten: &str, description: &str) -> Vec<TextEdit> {
    if original == rewritten {
        return Vec::new();
    }

    let old_lines: Vec<&str> = original.split('\n').collect();
    let new_lines: Vec<&str> = rewritten.split('\n').collect();

    if old_lines.len() != new_lines.len() {
        let end = position_at(original, original.len());
        return vec![TextEdit::replace(
            EditLocation::new(0, 0, end.line, end.character),
            original,
            rewritten,
        )
        .with_type(EditType::UpdateImport)
        .with_description(description)];
    }

    old_lines
        .iter()
        .zip(new_lines.iter())
        .enumerate()
        .filter_map(|(idx, (old, new))| {
            let old = old.strip_suffix('\r').unwrap_or(old);
            let new = new.strip_suffix('\r').unwrap_or(new);
            (old != new).then(|| {
                TextEdit::replace(EditLocation::on_line(idx as u32, 0, utf16_len(old)), old, new)
                    .with_type(EditType::UpdateImport)
                    .with_description(description)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_imports_are_not_path_references() {
        assert!(!is_path_reference(&ImportRef::new("react", ImportKind::Import)));
        assert!(!is_path_reference(&ImportRef::new("@scope/pkg", ImportKind::Require)));
        assert!(is_path_reference(&ImportRef::new("./a", ImportKind::ReExport)));
        assert!(is_path_reference(&ImportRef::new("docs/a.md", ImportKind::Link)));
    }

    #[test]
    fn test_line_edits_per_changed_line() {
        let original = "import a from './a';\r\nconst x = 1;\r\nimport b from './b';\r\n";
        let rewritten = "import a from '../lib/a';\r\nconst x = 1;\r\nimport b from './b';\r\n";
        let edits = line_edits(original, rewritten, "update");
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].location, EditLocation::on_line(0, 0, 20));
        assert_eq!(edits[0].new_text, "import a from '../lib/a';");
    }

    #[test]
    fn test_line_edits_whole_content_when_line_count_changes() {
        let edits = line_edits("a\nb\n", "a\n", "update");
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].location, EditLocation::new(0, 0, 2, 0));
        assert_eq!(edits[0].new_text, "a\n");
    }
}
