//! Edit merging, conflict detection, rendering and preview
//!
//! Every plan goes through [`EditMerger::validate`] before it is returned, so
//! overlapping edits and colliding file operations are rejected at plan time
//! rather than discovered half-way through an apply.

use super::workspace_fs::WorkspaceFs;
use refit_foundation::{
    FileChangeStatus, FileOperation, FilePreview, Plan, Preview, RefitError, RefitResult,
    TextEdit, WorkspaceEdit,
};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct EditMerger;

impl EditMerger {
    /// Combine edit sets into one, then validate the result.
    pub fn merge(edits: impl IntoIterator<Item = WorkspaceEdit>) -> RefitResult<WorkspaceEdit> {
        let mut merged = WorkspaceEdit::new();
        for edit in edits {
            for (path, file_edits) in edit.changes {
                let entry = merged.changes.entry(path).or_default();
                for file_edit in file_edits {
                    if !entry.contains(&file_edit) {
                        entry.push(file_edit);
                    }
                }
            }
            merged.file_operations.extend(edit.file_operations);
        }

        for file_edits in merged.changes.values_mut() {
            file_edits.sort_by_key(|e| (e.location.start(), e.location.end()));
        }
        merged.changes.retain(|_, file_edits| !file_edits.is_empty());

        Self::validate(&merged)?;
        Ok(merged)
    }

    /// Reject overlapping edits and colliding file operations.
    pub fn validate(edit: &WorkspaceEdit) -> RefitResult<()> {
        for (path, file_edits) in &edit.changes {
            let mut sorted: Vec<&TextEdit> = file_edits.iter().collect();
            sorted.sort_by_key(|e| (e.location.start(), e.location.end()));
            for (i, a) in sorted.iter().enumerate() {
                for b in &sorted[i + 1..] {
                    if b.location.start() > a.location.end() {
                        break;
                    }
                    if a.location.overlaps(&b.location) {
                        return Err(RefitError::conflict(
                            format!(
                                "Overlapping edits in {} at {}:{} and {}:{}",
                                path.display(),
                                a.location.start_line + 1,
                                a.location.start_column + 1,
                                b.location.start_line + 1,
                                b.location.start_column + 1
                            ),
                            vec![path.display().to_string()],
                        ));
                    }
                }
            }
        }

        let mut destinations: HashMap<&Path, usize> = HashMap::new();
        let mut sources: HashMap<&Path, usize> = HashMap::new();
        for (idx, op) in edit.file_operations.iter().enumerate() {
            if let Some(dest) = op.destination() {
                if destinations.insert(dest, idx).is_some() {
                    return Err(RefitError::conflict(
                        format!("Several operations produce {}", dest.display()),
                        vec![dest.display().to_string()],
                    ));
                }
            }
            let source = match op {
                FileOperation::Move { from, .. } => Some(from.as_path()),
                FileOperation::Delete { path } => Some(path.as_path()),
                FileOperation::Create { .. } => None,
            };
            if let Some(source) = source {
                if sources.insert(source, idx).is_some() {
                    return Err(RefitError::conflict(
                        format!("Several operations consume {}", source.display()),
                        vec![source.display().to_string()],
                    ));
                }
            }
        }

        for (source, src_idx) in &sources {
            if let Some(dst_idx) = destinations.get(source) {
                if dst_idx != src_idx {
                    return Err(RefitError::conflict(
                        format!(
                            "{} is both moved away and the destination of another operation",
                            source.display()
                        ),
                        vec![source.display().to_string()],
                    ));
                }
            }
        }

        for op in &edit.file_operations {
            if let FileOperation::Delete { path } = op {
                if edit.changes.get(path).is_some_and(|e| !e.is_empty()) {
                    return Err(RefitError::conflict(
                        format!("{} is edited and deleted by the same plan", path.display()),
                        vec![path.display().to_string()],
                    ));
                }
            }
        }

        Ok(())
    }

    /// Apply `edits` to `content`. Positions refer to `content` as given.
    pub fn apply_text_edits(path: &Path, content: &str, edits: &[TextEdit]) -> RefitResult<String> {
        if edits.is_empty() {
            return Ok(content.to_string());
        }

        let mut ranges = Vec::with_capacity(edits.len());
        for edit in edits {
            let (start, end) = edit.location.to_byte_range(content).ok_or_else(|| {
                RefitError::validation(format!(
                    "Edit at {}:{} does not fit {}",
                    edit.location.start_line + 1,
                    edit.location.start_column + 1,
                    path.display()
                ))
            })?;
            if !edit.original_text.is_empty() && content[start..end] != edit.original_text {
                return Err(RefitError::validation(format!(
                    "Expected '{}' at {}:{} in {}, found '{}'",
                    edit.original_text,
                    edit.location.start_line + 1,
                    edit.location.start_column + 1,
                    path.display(),
                    &content[start..end]
                )));
            }
            ranges.push((start, end, edit.new_text.as_str()));
        }

        // Back to front so earlier offsets stay valid
        ranges.sort_by_key(|(start, end, _)| (*start, *end));
        let mut result = content.to_string();
        for (start, end, new_text) in ranges.into_iter().rev() {
            result.replace_range(start..end, new_text);
        }
        Ok(result)
    }

    /// Render every affected file without touching disk.
    pub async fn preview(plan: &Plan, fs: &dyn WorkspaceFs) -> RefitResult<Preview> {
        let mut files: BTreeMap<PathBuf, FilePreview> = BTreeMap::new();
        let moves: HashMap<&Path, &Path> = plan
            .edit
            .file_operations
            .iter()
            .filter_map(|op| match op {
                FileOperation::Move { from, to, .. } => Some((from.as_path(), to.as_path())),
                _ => None,
            })
            .collect();

        for (path, edits) in &plan.edit.changes {
            if edits.is_empty() {
                continue;
            }
            let original = fs
                .read_to_string(path)
                .await
                .map_err(|e| RefitError::io_at(path, e))?;
            let rendered = Self::apply_text_edits(path, &original, edits)?;
            let new_path = moves.get(path.as_path()).map(|to| to.to_path_buf());
            let status = if new_path.is_some() {
                FileChangeStatus::Moved
            } else {
                FileChangeStatus::Modified
            };
            files.insert(
                path.clone(),
                FilePreview {
                    path: path.clone(),
                    new_path,
                    status,
                    original: Some(original),
                    rendered: Some(rendered),
                },
            );
        }

        for op in &plan.edit.file_operations {
            match op {
                FileOperation::Move { from, to, .. } => {
                    if files.contains_key(from) {
                        continue;
                    }
                    let content = read_text(fs, from).await?;
                    files.insert(
                        from.clone(),
                        FilePreview {
                            path: from.clone(),
                            new_path: Some(to.clone()),
                            status: FileChangeStatus::Moved,
                            original: content.clone(),
                            rendered: content,
                        },
                    );
                }
                FileOperation::Create { path, content, .. } => {
                    files.insert(
                        path.clone(),
                        FilePreview {
                            path: path.clone(),
                            new_path: None,
                            status: FileChangeStatus::Created,
                            original: None,
                            rendered: Some(content.clone()),
                        },
                    );
                }
                FileOperation::Delete { path } => {
                    let content = read_text(fs, path).await?;
                    files.insert(
                        path.clone(),
                        FilePreview {
                            path: path.clone(),
                            new_path: None,
                            status: FileChangeStatus::Deleted,
                            original: content,
                            rendered: None,
                        },
                    );
                }
            }
        }

        debug!(plan_id = %plan.id, files = files.len(), "Generated preview");
        Ok(Preview {
            plan_id: plan.id,
            files: files.into_values().collect(),
            warnings: plan.warnings.clone(),
            impact: plan.impact.clone(),
        })
    }
}

/// File content as text, `None` for binary files.
async fn read_text(fs: &dyn WorkspaceFs, path: &Path) -> RefitResult<Option<String>> {
    let bytes = fs.read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RefitError::file_not_found(path.display().to_string())
        } else {
            RefitError::io_at(path, e)
        }
    })?;
    Ok(String::from_utf8(bytes).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use refit_foundation::{EditLocation, ErrorKind, Position};

    fn edit_at(line: u32, col: u32, len: u32, old: &str, new: &str) -> TextEdit {
        TextEdit::replace(EditLocation::on_line(line, col, len), old, new)
    }

    #[test]
    fn test_apply_edits_back_to_front() {
        let content = "import a from './a';\nimport b from './b';\n";
        let edits = vec![
            edit_at(0, 15, 3, "./a", "../lib/a"),
            edit_at(1, 15, 3, "./b", "../lib/b"),
        ];
        let result = EditMerger::apply_text_edits(Path::new("x.ts"), content, &edits).unwrap();
        assert_eq!(result, "import a from '../lib/a';\nimport b from '../lib/b';\n");
    }

    #[test]
    fn test_insert_and_replace_at_same_point() {
        let content = "let x = 1;\n";
        let edits = vec![
            edit_at(0, 4, 1, "x", "y"),
            TextEdit::insert(Position::new(0, 4), "_"),
        ];
        let result = EditMerger::apply_text_edits(Path::new("x.ts"), content, &edits).unwrap();
        assert_eq!(result, "let _y = 1;\n");
    }

    #[test]
    fn test_original_text_mismatch_is_validation_error() {
        let err = EditMerger::apply_text_edits(
            Path::new("x.ts"),
            "abc\n",
            &[edit_at(0, 0, 1, "z", "y")],
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_overlapping_edits_conflict() {
        let mut a = WorkspaceEdit::new();
        a.add_edit("/p/a.ts", edit_at(0, 0, 5, "", "x"));
        let mut b = WorkspaceEdit::new();
        b.add_edit("/p/a.ts", edit_at(0, 3, 4, "", "y"));
        let err = EditMerger::merge(vec![a, b]).unwrap_err();
        assert!(matches!(err, RefitError::Conflict { .. }));
    }

    #[test]
    fn test_same_point_insertions_conflict() {
        let mut edit = WorkspaceEdit::new();
        edit.add_edit("/p/a.ts", TextEdit::insert(Position::new(2, 0), "a"));
        edit.add_edit("/p/a.ts", TextEdit::insert(Position::new(2, 0), "b"));
        assert!(EditMerger::validate(&edit).is_err());
    }

    #[test]
    fn test_identical_edits_are_merged_once() {
        let mut a = WorkspaceEdit::new();
        a.add_edit("/p/a.ts", edit_at(0, 0, 1, "a", "b"));
        let merged = EditMerger::merge(vec![a.clone(), a]).unwrap();
        assert_eq!(merged.edit_count(), 1);
    }

    #[test]
    fn test_duplicate_destination_conflict() {
        let mut edit = WorkspaceEdit::new();
        edit.add_operation(FileOperation::Move {
            from: "/p/a.ts".into(),
            to: "/p/b.ts".into(),
            overwrite: false,
        });
        edit.add_operation(FileOperation::Move {
            from: "/p/c.ts".into(),
            to: "/p/b.ts".into(),
            overwrite: false,
        });
        let err = EditMerger::validate(&edit).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_chained_move_conflict() {
        let mut edit = WorkspaceEdit::new();
        edit.add_operation(FileOperation::Move {
            from: "/p/a.ts".into(),
            to: "/p/b.ts".into(),
            overwrite: false,
        });
        edit.add_operation(FileOperation::Move {
            from: "/p/b.ts".into(),
            to: "/p/c.ts".into(),
            overwrite: false,
        });
        assert!(EditMerger::validate(&edit).is_err());
    }

    #[test]
    fn test_edit_on_deleted_file_conflict() {
        let mut edit = WorkspaceEdit::new();
        edit.add_edit("/p/a.ts", edit_at(0, 0, 1, "a", "b"));
        edit.add_operation(FileOperation::Delete { path: "/p/a.ts".into() });
        assert!(EditMerger::validate(&edit).is_err());
    }
}
