//! Tool handlers exposing refactoring operations
//!
//! Every tool plans through the shared [`refit_services::RefactorEngine`].
//! Planning tools default to `dryRun: true`: the plan is previewed and kept
//! for a later `apply_plan` call.

pub mod handlers;

pub use handlers::{
    AnalyzeImpactHandler, ApplyPlanHandler, DeleteHandler, ExtractHandler, InlineHandler,
    MoveHandler, RenameHandler, ToolCall, ToolHandler, ToolHandlerContext, ToolOptions,
    ToolRegistry,
};

/// Default value function for serde fields that should default to `true`
pub(crate) fn default_true() -> bool {
    true
}
