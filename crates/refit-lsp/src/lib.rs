//! Code intelligence for refit
//!
//! [`CodeIntelligence`] is the seam the plan builder talks to for symbol
//! references and renames. [`LspCodeIntelligence`] implements it on top of
//! language servers spoken to over stdio.

pub mod code_intelligence;
pub mod convert;
pub mod lsp_system;

pub use code_intelligence::{CodeIntelligence, NoCodeIntelligence};
pub use lsp_system::{LspClient, LspCodeIntelligence};
