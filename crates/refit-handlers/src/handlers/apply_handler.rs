//! Applies a plan kept by an earlier dry run

use super::common::{apply_content, parse_args};
use super::tools::{ToolCall, ToolHandler, ToolHandlerContext};
use async_trait::async_trait;
use refit_foundation::RefitResult;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

pub struct ApplyPlanHandler;

impl ApplyPlanHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ApplyPlanHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplyPlanParams {
    plan_id: Uuid,
}

#[async_trait]
impl ToolHandler for ApplyPlanHandler {
    fn tool_names(&self) -> &[&str] {
        &["apply_plan"]
    }

    async fn handle_tool_call(
        &self,
        context: &ToolHandlerContext,
        tool_call: &ToolCall,
    ) -> RefitResult<Value> {
        let params: ApplyPlanParams = parse_args("apply_plan", tool_call.arguments.as_ref())?;
        info!(plan_id = %params.plan_id, "Applying stored plan");
        let result = context.engine.apply_stored(params.plan_id).await?;
        Ok(json!({ "content": apply_content(&result)? }))
    }
}
