//! Inline operation handler

use super::common::{parse_args, plan_and_respond, ToolOptions};
use super::tools::{ToolCall, ToolHandler, ToolHandlerContext};
use async_trait::async_trait;
use refit_foundation::{InlineKind, Position, RefactorOperation, RefitResult};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

pub struct InlineHandler;

impl InlineHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for InlineHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineParams {
    kind: InlineKind,
    file_path: PathBuf,
    position: Position,
    #[serde(default)]
    options: ToolOptions,
}

pub(crate) fn parse_operation(
    arguments: Option<&Value>,
) -> RefitResult<(RefactorOperation, ToolOptions)> {
    let params: InlineParams = parse_args("inline", arguments)?;
    Ok((
        RefactorOperation::Inline {
            inline: params.kind,
            file: params.file_path,
            position: params.position,
        },
        params.options,
    ))
}

#[async_trait]
impl ToolHandler for InlineHandler {
    fn tool_names(&self) -> &[&str] {
        &["inline"]
    }

    async fn handle_tool_call(
        &self,
        context: &ToolHandlerContext,
        tool_call: &ToolCall,
    ) -> RefitResult<Value> {
        let (operation, options) = parse_operation(tool_call.arguments.as_ref())?;
        debug!(file_path = ?operation.primary_path(), "Planning inline operation");
        plan_and_respond(context, "inline", operation, &options).await
    }
}
