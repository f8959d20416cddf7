//! Foundation Layer - error taxonomy and planning data model
//!
//! This crate provides the building blocks shared by every refit crate:
//! - `errors`: the unified `RefitError` type and its serialisable response form
//! - `planning`: operations, edits, plans, impact analysis and apply results

pub mod errors;
pub mod planning;

// Re-export commonly used types for convenience
pub use errors::{ErrorKind, ErrorResponse, RefitError, RefitResult};
pub use planning::*;
