//! Tool handler registry
//!
//! Central registry for all tool handlers with automatic routing based on tool names.

use super::tools::{ToolCall, ToolHandler, ToolHandlerContext};
use super::{
    AnalyzeImpactHandler, ApplyPlanHandler, DeleteHandler, ExtractHandler, InlineHandler,
    MoveHandler, RenameHandler,
};
use refit_config::logging::request_span;
use refit_foundation::{ErrorResponse, RefitError, RefitResult};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

struct RegisteredTool {
    handler: Arc<dyn ToolHandler>,
    /// Handler type name, for diagnostics
    handler_name: String,
}

/// Routes tool calls to handlers by tool name
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registry with every refactoring tool installed.
    pub fn with_refactoring_tools() -> Self {
        let mut registry = Self::new();
        registry.register_with_name(Arc::new(RenameHandler::new()), "RenameHandler");
        registry.register_with_name(Arc::new(MoveHandler::new()), "MoveHandler");
        registry.register_with_name(Arc::new(ExtractHandler::new()), "ExtractHandler");
        registry.register_with_name(Arc::new(InlineHandler::new()), "InlineHandler");
        registry.register_with_name(Arc::new(DeleteHandler::new()), "DeleteHandler");
        registry.register_with_name(Arc::new(AnalyzeImpactHandler::new()), "AnalyzeImpactHandler");
        registry.register_with_name(Arc::new(ApplyPlanHandler::new()), "ApplyPlanHandler");
        registry
    }

    /// Register every tool `handler` answers to. A later registration of the
    /// same tool name wins.
    pub fn register_with_name(&mut self, handler: Arc<dyn ToolHandler>, handler_name: &str) {
        for tool_name in handler.tool_names() {
            debug!(tool_name = %tool_name, handler_name = %handler_name, "Registering tool handler");
            let entry = RegisteredTool {
                handler: handler.clone(),
                handler_name: handler_name.to_string(),
            };
            if let Some(previous) = self.tools.insert(tool_name.to_string(), entry) {
                warn!(
                    tool_name = %tool_name,
                    replaced = %previous.handler_name,
                    "Tool handler replaced (duplicate registration)"
                );
            }
        }
    }

    /// Route a tool call to the appropriate handler
    ///
    /// Each call runs inside a `request` span carrying a fresh request id.
    pub async fn handle_tool(
        &self,
        tool_call: ToolCall,
        context: &ToolHandlerContext,
    ) -> RefitResult<Value> {
        let Some(tool) = self.tools.get(&tool_call.name) else {
            return Err(RefitError::NotSupported {
                operation: tool_call.name,
                reason: Some(format!(
                    "Unknown tool. Available tools: {}",
                    self.list_tools().join(", ")
                )),
            });
        };

        let request_id = Uuid::new_v4().to_string();
        let span = request_span(&request_id, &tool_call.name);
        tool.handler
            .handle_tool_call(context, &tool_call)
            .instrument(span)
            .await
    }

    /// Like [`handle_tool`](Self::handle_tool), but folds a failure into an
    /// `{"error": ...}` payload.
    pub async fn dispatch(&self, tool_call: ToolCall, context: &ToolHandlerContext) -> Value {
        let tool = tool_call.name.clone();
        match self.handle_tool(tool_call, context).await {
            Ok(value) => value,
            Err(e) => {
                warn!(tool = %tool, error = %e, "Tool call failed");
                json!({ "error": ErrorResponse::from(e) })
            }
        }
    }

    pub fn has_tool(&self, tool_name: &str) -> bool {
        self.tools.contains_key(tool_name)
    }

    /// Registered tool names, sorted
    pub fn list_tools(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// `(tool, handler type)` pairs, sorted by tool
    pub fn list_tools_with_handlers(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .tools
            .iter()
            .map(|(name, tool)| (name.clone(), tool.handler_name.clone()))
            .collect();
        pairs.sort();
        pairs
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
