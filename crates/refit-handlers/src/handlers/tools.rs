//! Tool handler contract

use async_trait::async_trait;
use refit_foundation::RefitResult;
use refit_services::RefactorEngine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// One invocation of a named tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments: Some(arguments),
        }
    }
}

/// Context provided to tool handlers
///
/// Built once at process start and shared by every call.
#[derive(Clone)]
pub struct ToolHandlerContext {
    pub engine: Arc<RefactorEngine>,
}

impl ToolHandlerContext {
    pub fn new(engine: Arc<RefactorEngine>) -> Self {
        Self { engine }
    }
}

/// Unified trait for all tool handlers
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Returns a slice of tool names this handler is responsible for.
    fn tool_names(&self) -> &[&str];

    /// Handles an incoming tool call.
    async fn handle_tool_call(
        &self,
        context: &ToolHandlerContext,
        tool_call: &ToolCall,
    ) -> RefitResult<Value>;
}
