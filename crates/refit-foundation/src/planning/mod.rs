//! Planning data model: operations, edits, plans and apply results.

pub mod edit;
pub mod operation;
pub mod plan;
pub mod result;

pub use edit::{
    byte_offset, position_at, utf16_len, EditLocation, EditType, FileOperation, Position,
    TextEdit, WorkspaceEdit,
};
pub use operation::{
    DeleteTarget, ExtractKind, InlineKind, MoveSpec, RefactorOperation, SymbolTarget,
};
pub use plan::{
    warning_codes, Diagnostic, DiagnosticSeverity, ImpactAnalysis, Location, Plan, PlanOutcome,
    PlanWarning, RiskLevel, SymbolCandidate,
};
pub use result::{
    ApplyResult, ApplyState, FileChangeStatus, FilePreview, Preview, RestoreFailure,
    ValidationResult,
};
