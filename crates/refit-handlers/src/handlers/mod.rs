//! Tool handlers, one per operation family

mod apply_handler;
mod common;
mod delete_handler;
mod extract_handler;
mod impact_handler;
mod inline_handler;
mod move_handler;
mod rename_handler;
pub mod tool_registry;
pub mod tools;

pub use apply_handler::ApplyPlanHandler;
pub use common::{TargetKind, ToolOptions};
pub use delete_handler::DeleteHandler;
pub use extract_handler::ExtractHandler;
pub use impact_handler::AnalyzeImpactHandler;
pub use inline_handler::InlineHandler;
pub use move_handler::MoveHandler;
pub use rename_handler::RenameHandler;
pub use tool_registry::ToolRegistry;
pub use tools::{ToolCall, ToolHandler, ToolHandlerContext};
