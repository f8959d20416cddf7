pub mod services;

// Re-export commonly used types at crate root for convenience
pub use services::{
    CancellationFlag, EditMerger, LocalFs, PlanBuilder, PostApplyValidator, RefactorEngine,
    VerificationHook, WorkspaceFs,
};
