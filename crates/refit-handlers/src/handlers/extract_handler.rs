//! Extract operation handler - implements extract command with dryRun option
//!
//! Supports extracting a selected range into a new function, variable or
//! constant. The language plugin owning the file produces the edit.

use super::common::{parse_args, plan_and_respond, RangeParam, ToolOptions};
use super::tools::{ToolCall, ToolHandler, ToolHandlerContext};
use async_trait::async_trait;
use refit_foundation::{ExtractKind, RefactorOperation, RefitResult};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

pub struct ExtractHandler;

impl ExtractHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExtractHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractParams {
    kind: ExtractKind,
    file_path: PathBuf,
    range: RangeParam,
    name: String,
    #[serde(default)]
    options: ToolOptions,
}

pub(crate) fn parse_operation(
    arguments: Option<&Value>,
) -> RefitResult<(RefactorOperation, ToolOptions)> {
    let params: ExtractParams = parse_args("extract", arguments)?;
    Ok((
        RefactorOperation::Extract {
            extract: params.kind,
            file: params.file_path,
            range: params.range.into(),
            name: params.name,
        },
        params.options,
    ))
}

#[async_trait]
impl ToolHandler for ExtractHandler {
    fn tool_names(&self) -> &[&str] {
        &["extract"]
    }

    async fn handle_tool_call(
        &self,
        context: &ToolHandlerContext,
        tool_call: &ToolCall,
    ) -> RefitResult<Value> {
        let (operation, options) = parse_operation(tool_call.arguments.as_ref())?;
        debug!(file_path = ?operation.primary_path(), "Planning extract operation");
        plan_and_respond(context, "extract", operation, &options).await
    }
}
