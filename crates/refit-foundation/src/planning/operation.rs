//! Refactor operation descriptors, as requested by callers.

use super::edit::{EditLocation, Position};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One source/destination pair in a batch move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveSpec {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// How a symbol to rename is identified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum SymbolTarget {
    /// Exact position of an occurrence.
    Position { file: PathBuf, position: Position },
    /// Bare name; resolved through workspace symbol search and may be ambiguous.
    Name {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractKind {
    Function,
    Variable,
    Constant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InlineKind {
    Variable,
    Function,
}

/// What a delete removes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum DeleteTarget {
    Symbol { file: PathBuf, position: Position },
    File { path: PathBuf },
    Directory { path: PathBuf },
}

/// A requested refactoring. Plans are built from these and never mutate disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RefactorOperation {
    RenameFile {
        old_path: PathBuf,
        new_path: PathBuf,
        #[serde(default)]
        overwrite: bool,
    },
    RenameDirectory {
        old_path: PathBuf,
        new_path: PathBuf,
        #[serde(default)]
        overwrite: bool,
    },
    RenameSymbol {
        target: SymbolTarget,
        new_name: String,
    },
    /// File or directory move; the kind is detected when planning.
    Move {
        source: PathBuf,
        destination: PathBuf,
        #[serde(default)]
        overwrite: bool,
    },
    BatchMove {
        moves: Vec<MoveSpec>,
        #[serde(default)]
        overwrite: bool,
    },
    Extract {
        extract: ExtractKind,
        file: PathBuf,
        range: EditLocation,
        name: String,
    },
    Inline {
        inline: InlineKind,
        file: PathBuf,
        position: Position,
    },
    Delete {
        delete: DeleteTarget,
    },
}

impl RefactorOperation {
    /// Short label used in logs and tool responses.
    pub fn label(&self) -> &'static str {
        match self {
            RefactorOperation::RenameFile { .. } => "rename_file",
            RefactorOperation::RenameDirectory { .. } => "rename_directory",
            RefactorOperation::RenameSymbol { .. } => "rename_symbol",
            RefactorOperation::Move { .. } => "move",
            RefactorOperation::BatchMove { .. } => "batch_move",
            RefactorOperation::Extract { .. } => "extract",
            RefactorOperation::Inline { .. } => "inline",
            RefactorOperation::Delete { .. } => "delete",
        }
    }

    /// The primary file or directory the operation is anchored on.
    pub fn primary_path(&self) -> Option<&Path> {
        match self {
            RefactorOperation::RenameFile { old_path, .. }
            | RefactorOperation::RenameDirectory { old_path, .. } => Some(old_path),
            RefactorOperation::RenameSymbol { target, .. } => match target {
                SymbolTarget::Position { file, .. } => Some(file),
                SymbolTarget::Name { file, .. } => file.as_deref(),
            },
            RefactorOperation::Move { source, .. } => Some(source),
            RefactorOperation::BatchMove { moves, .. } => {
                moves.first().map(|m| m.source.as_path())
            }
            RefactorOperation::Extract { file, .. } | RefactorOperation::Inline { file, .. } => {
                Some(file)
            }
            RefactorOperation::Delete { delete } => match delete {
                DeleteTarget::Symbol { file, .. } => Some(file),
                DeleteTarget::File { path } | DeleteTarget::Directory { path } => Some(path),
            },
        }
    }

    pub fn is_symbol_rename(&self) -> bool {
        matches!(self, RefactorOperation::RenameSymbol { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_operation_serde_shape() {
        let op = RefactorOperation::Move {
            source: "/p/src/a.ts".into(),
            destination: "/p/lib/a.ts".into(),
            overwrite: false,
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["kind"], "move");
        assert_eq!(json["source"], "/p/src/a.ts");

        let back: RefactorOperation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn test_symbol_target_by_name() {
        let json = serde_json::json!({
            "kind": "rename_symbol",
            "target": { "by": "name", "name": "helper" },
            "new_name": "assist"
        });
        let op: RefactorOperation = serde_json::from_value(json).unwrap();
        assert!(op.is_symbol_rename());
        assert_eq!(op.primary_path(), None);
        assert_eq!(op.label(), "rename_symbol");
    }
}
