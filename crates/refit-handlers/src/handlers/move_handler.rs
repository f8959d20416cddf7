//! Move operation handler
//!
//! A single `source`/`destination` pair plans a file or directory move; a
//! `moves` list plans one batch that applies atomically.

use super::common::{parse_args, plan_and_respond, ToolOptions};
use super::tools::{ToolCall, ToolHandler, ToolHandlerContext};
use async_trait::async_trait;
use refit_foundation::{MoveSpec, RefactorOperation, RefitError, RefitResult};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

pub struct MoveHandler;

impl MoveHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MoveHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct MoveEntry {
    source: PathBuf,
    destination: PathBuf,
}

#[derive(Debug, Deserialize)]
struct MoveParams {
    #[serde(default)]
    source: Option<PathBuf>,
    #[serde(default)]
    destination: Option<PathBuf>,
    #[serde(default)]
    moves: Option<Vec<MoveEntry>>,
    #[serde(default)]
    options: ToolOptions,
}

pub(crate) fn parse_operation(
    arguments: Option<&Value>,
) -> RefitResult<(RefactorOperation, ToolOptions)> {
    let params: MoveParams = parse_args("move", arguments)?;
    let overwrite = params.options.overwrite;

    let operation = match (params.source, params.destination, params.moves) {
        (Some(source), Some(destination), None) => RefactorOperation::Move {
            source,
            destination,
            overwrite,
        },
        (None, None, Some(moves)) if !moves.is_empty() => RefactorOperation::BatchMove {
            moves: moves
                .into_iter()
                .map(|m| MoveSpec {
                    source: m.source,
                    destination: m.destination,
                })
                .collect(),
            overwrite,
        },
        (None, None, Some(_)) => {
            return Err(RefitError::invalid_request("'moves' must not be empty"));
        }
        _ => {
            return Err(RefitError::invalid_request(
                "Provide either 'source' and 'destination' or a 'moves' list",
            ));
        }
    };
    Ok((operation, params.options))
}

#[async_trait]
impl ToolHandler for MoveHandler {
    fn tool_names(&self) -> &[&str] {
        &["move"]
    }

    async fn handle_tool_call(
        &self,
        context: &ToolHandlerContext,
        tool_call: &ToolCall,
    ) -> RefitResult<Value> {
        let (operation, options) = parse_operation(tool_call.arguments.as_ref())?;
        debug!(operation = operation.label(), dry_run = options.dry_run, "Planning move");
        plan_and_respond(context, "move", operation, &options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_single_move() {
        let args = json!({ "source": "src/a.ts", "destination": "lib/a.ts" });
        let (op, options) = parse_operation(Some(&args)).unwrap();
        assert!(options.dry_run);
        assert_eq!(
            op,
            RefactorOperation::Move {
                source: "src/a.ts".into(),
                destination: "lib/a.ts".into(),
                overwrite: false,
            }
        );
    }

    #[test]
    fn test_batch_move() {
        let args = json!({
            "moves": [
                { "source": "a.md", "destination": "docs/a.md" },
                { "source": "b.md", "destination": "docs/b.md" }
            ],
            "options": { "overwrite": true }
        });
        let (op, _) = parse_operation(Some(&args)).unwrap();
        match op {
            RefactorOperation::BatchMove { moves, overwrite } => {
                assert_eq!(moves.len(), 2);
                assert_eq!(moves[1].destination, PathBuf::from("docs/b.md"));
                assert!(overwrite);
            }
            other => panic!("expected batch move, got {:?}", other),
        }
    }

    #[test]
    fn test_mixed_or_empty_requests_rejected() {
        let cases = [
            json!({}),
            json!({ "source": "a.md" }),
            json!({ "moves": [] }),
            json!({
                "source": "a.md",
                "destination": "b.md",
                "moves": [{ "source": "c.md", "destination": "d.md" }]
            }),
        ];
        for args in cases {
            let err = parse_operation(Some(&args)).unwrap_err();
            assert!(matches!(err, RefitError::InvalidRequest { .. }), "{}", args);
        }
    }
}
