//! Impact analysis handler
//!
//! Takes the same arguments as a planning tool, wrapped as
//! `{ "tool": "<name>", "arguments": { ... } }`, and reports the blast radius
//! without storing a plan.

use super::common::parse_args;
use super::tools::{ToolCall, ToolHandler, ToolHandlerContext};
use super::{delete_handler, extract_handler, inline_handler, move_handler, rename_handler};
use async_trait::async_trait;
use refit_foundation::{RefactorOperation, RefitError, RefitResult};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

pub struct AnalyzeImpactHandler;

impl AnalyzeImpactHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AnalyzeImpactHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct ImpactParams {
    tool: String,
    #[serde(default)]
    arguments: Option<Value>,
}

fn parse_operation(arguments: Option<&Value>) -> RefitResult<RefactorOperation> {
    let params: ImpactParams = parse_args("analyze_impact", arguments)?;
    let inner = params.arguments.as_ref();
    let (operation, _) = match params.tool.as_str() {
        "rename" => rename_handler::parse_operation(inner)?,
        "move" => move_handler::parse_operation(inner)?,
        "extract" => extract_handler::parse_operation(inner)?,
        "inline" => inline_handler::parse_operation(inner)?,
        "delete" => delete_handler::parse_operation(inner)?,
        other => {
            return Err(RefitError::invalid_request(format!(
                "Cannot analyze impact of '{}'. Expected one of: rename, move, extract, inline, delete",
                other
            )))
        }
    };
    Ok(operation)
}

#[async_trait]
impl ToolHandler for AnalyzeImpactHandler {
    fn tool_names(&self) -> &[&str] {
        &["analyze_impact"]
    }

    async fn handle_tool_call(
        &self,
        context: &ToolHandlerContext,
        tool_call: &ToolCall,
    ) -> RefitResult<Value> {
        let operation = parse_operation(tool_call.arguments.as_ref())?;
        debug!(operation = operation.label(), "Analyzing impact");
        let impact = context.engine.analyze_impact(operation).await?;
        Ok(json!({ "content": { "impact": serde_json::to_value(&impact)? } }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatches_to_tool_parser() {
        let args = json!({
            "tool": "move",
            "arguments": { "source": "src/a.ts", "destination": "lib/a.ts" }
        });
        let op = parse_operation(Some(&args)).unwrap();
        assert_eq!(op.label(), "move");
    }

    #[test]
    fn test_unknown_tool_rejected() {
        let args = json!({ "tool": "apply_plan", "arguments": {} });
        assert!(matches!(
            parse_operation(Some(&args)),
            Err(RefitError::InvalidRequest { .. })
        ));
    }
}
