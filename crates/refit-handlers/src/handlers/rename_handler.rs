//! Rename operation handler
//!
//! Symbols are renamed through code intelligence; files and directories are
//! renamed in place with every reference to them rewritten.

use super::common::{parse_args, plan_and_respond, require, TargetKind, ToolOptions};
use super::tools::{ToolCall, ToolHandler, ToolHandlerContext};
use async_trait::async_trait;
use refit_foundation::{Position, RefactorOperation, RefitError, RefitResult, SymbolTarget};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

pub struct RenameHandler;

impl RenameHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RenameHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenameTarget {
    kind: TargetKind,
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    position: Option<Position>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenameParams {
    target: RenameTarget,
    new_name: String,
    #[serde(default)]
    options: ToolOptions,
}

pub(crate) fn parse_operation(
    arguments: Option<&Value>,
) -> RefitResult<(RefactorOperation, ToolOptions)> {
    let params: RenameParams = parse_args("rename", arguments)?;
    let RenameTarget {
        kind,
        path,
        position,
        name,
    } = params.target;

    let operation = match kind {
        TargetKind::Symbol => {
            let target = match (position, name) {
                (Some(position), _) => SymbolTarget::Position {
                    file: require(path, "target.path", "when renaming by position")?,
                    position,
                },
                (None, Some(name)) => SymbolTarget::Name { name, file: path },
                (None, None) => {
                    return Err(RefitError::invalid_request(
                        "Symbol rename needs either 'target.position' or 'target.name'",
                    ))
                }
            };
            RefactorOperation::RenameSymbol {
                target,
                new_name: params.new_name,
            }
        }
        TargetKind::File => RefactorOperation::RenameFile {
            old_path: require(path, "target.path", "for a file rename")?,
            new_path: PathBuf::from(params.new_name),
            overwrite: params.options.overwrite,
        },
        TargetKind::Directory => RefactorOperation::RenameDirectory {
            old_path: require(path, "target.path", "for a directory rename")?,
            new_path: PathBuf::from(params.new_name),
            overwrite: params.options.overwrite,
        },
    };
    Ok((operation, params.options))
}

#[async_trait]
impl ToolHandler for RenameHandler {
    fn tool_names(&self) -> &[&str] {
        &["rename"]
    }

    async fn handle_tool_call(
        &self,
        context: &ToolHandlerContext,
        tool_call: &ToolCall,
    ) -> RefitResult<Value> {
        let (operation, options) = parse_operation(tool_call.arguments.as_ref())?;
        debug!(operation = operation.label(), dry_run = options.dry_run, "Planning rename");
        plan_and_respond(context, "rename", operation, &options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_symbol_by_position() {
        let args = json!({
            "target": { "kind": "symbol", "path": "src/user.ts", "position": { "line": 0, "character": 16 } },
            "newName": "fetchUser"
        });
        let (op, options) = parse_operation(Some(&args)).unwrap();
        assert!(options.dry_run);
        assert_eq!(
            op,
            RefactorOperation::RenameSymbol {
                target: SymbolTarget::Position {
                    file: "src/user.ts".into(),
                    position: Position::new(0, 16),
                },
                new_name: "fetchUser".into(),
            }
        );
    }

    #[test]
    fn test_symbol_by_name_keeps_optional_file() {
        let args = json!({
            "target": { "kind": "symbol", "name": "format" },
            "newName": "formatMoney"
        });
        let (op, _) = parse_operation(Some(&args)).unwrap();
        assert_eq!(
            op,
            RefactorOperation::RenameSymbol {
                target: SymbolTarget::Name {
                    name: "format".into(),
                    file: None
                },
                new_name: "formatMoney".into(),
            }
        );
    }

    #[test]
    fn test_file_rename_carries_overwrite() {
        let args = json!({
            "target": { "kind": "file", "path": "docs/a.md" },
            "newName": "docs/b.md",
            "options": { "dryRun": false, "overwrite": true }
        });
        let (op, options) = parse_operation(Some(&args)).unwrap();
        assert!(!options.dry_run);
        assert_eq!(
            op,
            RefactorOperation::RenameFile {
                old_path: "docs/a.md".into(),
                new_path: "docs/b.md".into(),
                overwrite: true,
            }
        );
    }

    #[test]
    fn test_missing_target_fields_rejected() {
        let no_path = json!({ "target": { "kind": "directory" }, "newName": "lib" });
        assert!(matches!(
            parse_operation(Some(&no_path)),
            Err(RefitError::InvalidRequest { .. })
        ));

        let bare_symbol = json!({ "target": { "kind": "symbol" }, "newName": "x" });
        assert!(matches!(
            parse_operation(Some(&bare_symbol)),
            Err(RefitError::InvalidRequest { .. })
        ));

        let unknown_kind = json!({ "target": { "kind": "module", "path": "a" }, "newName": "b" });
        assert!(matches!(
            parse_operation(Some(&unknown_kind)),
            Err(RefitError::InvalidRequest { .. })
        ));
    }
}
