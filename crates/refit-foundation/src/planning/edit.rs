//! Edit types: positions, text edits, file operations and workspace edits.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Zero-based position. `character` counts UTF-16 code units, matching the
/// default LSP position encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Location of an edit in the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditLocation {
    /// Start line (0-based)
    pub start_line: u32,
    /// Start column (0-based, UTF-16 code units)
    pub start_column: u32,
    /// End line (0-based)
    pub end_line: u32,
    /// End column (0-based, UTF-16 code units, exclusive)
    pub end_column: u32,
}

impl EditLocation {
    pub fn new(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// Location covering `len` UTF-16 units on a single line.
    pub fn on_line(line: u32, column: u32, len: u32) -> Self {
        Self::new(line, column, line, column + len)
    }

    pub fn start(&self) -> Position {
        Position::new(self.start_line, self.start_column)
    }

    pub fn end(&self) -> Position {
        Position::new(self.end_line, self.end_column)
    }

    pub fn is_empty(&self) -> bool {
        self.start() == self.end()
    }

    /// Whether two ranges share at least one character, or are insertions at
    /// the same point. Touching ranges (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &EditLocation) -> bool {
        if self.is_empty() && other.is_empty() {
            return self.start() == other.start();
        }
        self.start() < other.end() && other.start() < self.end()
            || (self.is_empty() && other.start() < self.start() && self.start() < other.end())
            || (other.is_empty() && self.start() < other.start() && other.start() < self.end())
    }

    /// Convert to byte offsets into `content`. Returns `None` when the
    /// location does not fit the content.
    pub fn to_byte_range(&self, content: &str) -> Option<(usize, usize)> {
        let start = byte_offset(content, self.start())?;
        let end = byte_offset(content, self.end())?;
        (start <= end).then_some((start, end))
    }
}

/// Byte offset of `position` in `content`, or `None` if out of bounds.
/// A column past the end of a line is rejected rather than clamped.
pub fn byte_offset(content: &str, position: Position) -> Option<usize> {
    let mut line_start = 0usize;
    for _ in 0..position.line {
        let rest = content.get(line_start..)?;
        let newline = rest.find('\n')?;
        line_start += newline + 1;
    }

    let line = content.get(line_start..)?;
    let line = line.split('\n').next().unwrap_or("");
    let line = line.strip_suffix('\r').unwrap_or(line);

    let mut units = 0u32;
    for (idx, ch) in line.char_indices() {
        if units == position.character {
            return Some(line_start + idx);
        }
        units += ch.len_utf16() as u32;
        if units > position.character {
            return None;
        }
    }
    (units == position.character).then_some(line_start + line.len())
}

/// Position of a byte offset in `content`. The offset must sit on a char boundary.
pub fn position_at(content: &str, offset: usize) -> Position {
    let before = &content[..offset.min(content.len())];
    let line = before.matches('\n').count() as u32;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let character = before[line_start..].encode_utf16().count() as u32;
    Position::new(line, character)
}

/// Length of `text` in UTF-16 code units.
pub fn utf16_len(text: &str) -> u32 {
    text.encode_utf16().count() as u32
}

/// Individual text edit operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEdit {
    /// Edit type classification
    pub edit_type: EditType,
    /// Location of the edit
    pub location: EditLocation,
    /// Original text to be replaced (empty when unknown)
    #[serde(default)]
    pub original_text: String,
    /// New text to insert
    pub new_text: String,
    /// Description of what this edit does
    #[serde(default)]
    pub description: String,
}

impl TextEdit {
    pub fn replace(location: EditLocation, original: impl Into<String>, new_text: impl Into<String>) -> Self {
        Self {
            edit_type: EditType::Replace,
            location,
            original_text: original.into(),
            new_text: new_text.into(),
            description: String::new(),
        }
    }

    pub fn insert(at: Position, new_text: impl Into<String>) -> Self {
        Self {
            edit_type: EditType::Insert,
            location: EditLocation::new(at.line, at.character, at.line, at.character),
            original_text: String::new(),
            new_text: new_text.into(),
            description: String::new(),
        }
    }

    pub fn with_type(mut self, edit_type: EditType) -> Self {
        self.edit_type = edit_type;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Types of edits that can be performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditType {
    /// Rename identifier
    Rename,
    /// Update import path
    UpdateImport,
    /// Update a path mentioned in prose or config
    UpdateReference,
    /// Add new code
    Insert,
    /// Remove code
    Delete,
    /// Replace code
    Replace,
}

/// A filesystem-level change. Directory changes are expanded into one
/// operation per file when the plan is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileOperation {
    Move {
        from: PathBuf,
        to: PathBuf,
        #[serde(default)]
        overwrite: bool,
    },
    Create {
        path: PathBuf,
        content: String,
        #[serde(default)]
        overwrite: bool,
    },
    Delete {
        path: PathBuf,
    },
}

impl FileOperation {
    /// Every path this operation touches, both endpoints for a move.
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            FileOperation::Move { from, to, .. } => vec![from.as_path(), to.as_path()],
            FileOperation::Create { path, .. } | FileOperation::Delete { path } => {
                vec![path.as_path()]
            }
        }
    }

    /// The path that exists after this operation, if any.
    pub fn destination(&self) -> Option<&Path> {
        match self {
            FileOperation::Move { to, .. } => Some(to),
            FileOperation::Create { path, .. } => Some(path),
            FileOperation::Delete { .. } => None,
        }
    }
}

/// Merged, path-keyed set of text edits plus file operations.
///
/// Text edits are keyed by the file's path *before* any move in the same
/// edit: content is rewritten in place first and moved afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceEdit {
    pub changes: BTreeMap<PathBuf, Vec<TextEdit>>,
    pub file_operations: Vec<FileOperation>,
}

impl WorkspaceEdit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.values().all(|edits| edits.is_empty()) && self.file_operations.is_empty()
    }

    pub fn add_edit(&mut self, path: impl Into<PathBuf>, edit: TextEdit) {
        self.changes.entry(path.into()).or_default().push(edit);
    }

    pub fn add_edits(&mut self, path: impl Into<PathBuf>, edits: impl IntoIterator<Item = TextEdit>) {
        self.changes.entry(path.into()).or_default().extend(edits);
    }

    pub fn add_operation(&mut self, operation: FileOperation) {
        self.file_operations.push(operation);
    }

    /// Files with at least one text edit.
    pub fn edited_files(&self) -> impl Iterator<Item = &PathBuf> {
        self.changes
            .iter()
            .filter(|(_, edits)| !edits.is_empty())
            .map(|(path, _)| path)
    }

    pub fn edit_count(&self) -> usize {
        self.changes.values().map(Vec::len).sum()
    }

    /// Every path this edit touches, sorted: edited files and both endpoints of moves.
    pub fn touched_paths(&self) -> BTreeSet<PathBuf> {
        let mut paths: BTreeSet<PathBuf> = self.edited_files().cloned().collect();
        for op in &self.file_operations {
            paths.extend(op.paths().into_iter().map(Path::to_path_buf));
        }
        paths
    }
}
