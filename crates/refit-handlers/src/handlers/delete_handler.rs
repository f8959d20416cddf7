//! Delete operation handler
//!
//! Deleting never rewrites references; the plan carries a dangling-reference
//! warning for every referrer that would be left behind.

use super::common::{parse_args, plan_and_respond, require, TargetKind, ToolOptions};
use super::tools::{ToolCall, ToolHandler, ToolHandlerContext};
use async_trait::async_trait;
use refit_foundation::{DeleteTarget, Position, RefactorOperation, RefitResult};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

pub struct DeleteHandler;

impl DeleteHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DeleteHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct DeleteParams {
    kind: TargetKind,
    path: PathBuf,
    #[serde(default)]
    position: Option<Position>,
    #[serde(default)]
    options: ToolOptions,
}

pub(crate) fn parse_operation(
    arguments: Option<&Value>,
) -> RefitResult<(RefactorOperation, ToolOptions)> {
    let params: DeleteParams = parse_args("delete", arguments)?;
    let delete = match params.kind {
        TargetKind::Symbol => DeleteTarget::Symbol {
            file: params.path,
            position: require(params.position, "position", "when deleting a symbol")?,
        },
        TargetKind::File => DeleteTarget::File { path: params.path },
        TargetKind::Directory => DeleteTarget::Directory { path: params.path },
    };
    Ok((RefactorOperation::Delete { delete }, params.options))
}

#[async_trait]
impl ToolHandler for DeleteHandler {
    fn tool_names(&self) -> &[&str] {
        &["delete"]
    }

    async fn handle_tool_call(
        &self,
        context: &ToolHandlerContext,
        tool_call: &ToolCall,
    ) -> RefitResult<Value> {
        let (operation, options) = parse_operation(tool_call.arguments.as_ref())?;
        debug!(path = ?operation.primary_path(), dry_run = options.dry_run, "Planning delete");
        plan_and_respond(context, "delete", operation, &options).await
    }
}
