//! Core Plugin API for Language Support
//!
//! This crate defines the traits a language plugin implements so the refactor
//! engine can track references in that language. Every capability is optional:
//! a plugin exposes only what it supports, and the engine degrades to its
//! generic text detector for the rest.
//!
//! # Architecture
//!
//! - `LanguagePlugin`: the entry point, keyed by file extension
//! - `import_support`: parsing and rewriting of import specifiers
//! - `capabilities`: language-aware refactorings (extract, inline, delete)
//! - `specifier`: style-preserving specifier formatting shared by plugins
//! - `registry`: extension lookup, first registered plugin wins

use refit_foundation::RefitError;
use serde::{Deserialize, Serialize};

// ============================================================================
// Module Declarations
// ============================================================================

pub mod capabilities;
pub mod import_support;
pub mod metadata;
pub mod registry;
pub mod specifier;

// Re-exports
pub use capabilities::{DeleteSymbolParams, ExtractParams, InlineParams, RefactoringProvider};
pub use import_support::{ImportKind, ImportMoveSupport, ImportParser, ImportRef, ImportRenameSupport};
pub use metadata::LanguageMetadata;
pub use registry::PluginRegistry;
pub use specifier::{SpecifierBase, SpecifierPrefix, SpecifierRequest, SpecifierStyle};

// ============================================================================
// Error Types
// ============================================================================

pub type PluginResult<T> = Result<T, PluginApiError>;

/// Failure reported by a language plugin
///
/// Converted into [`RefitError`] at the engine boundary, where
/// `NotSupported` lets the engine fall back or report the gap.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PluginApiError {
    /// The source could not be understood well enough to act on
    #[error("Parse error: {message}")]
    Parse {
        message: String,
        location: Option<SourceLocation>,
    },

    #[error("Operation not supported: {operation}")]
    NotSupported { operation: String },

    /// The request itself is unusable (empty selection, bad name, ...)
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PluginApiError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            location: None,
        }
    }

    pub fn parse_at(message: impl Into<String>, line: u32, column: u32) -> Self {
        Self::Parse {
            message: message.into(),
            location: Some(SourceLocation { line, column }),
        }
    }

    pub fn not_supported(operation: impl Into<String>) -> Self {
        Self::NotSupported {
            operation: operation.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<PluginApiError> for RefitError {
    fn from(err: PluginApiError) -> Self {
        match err {
            PluginApiError::NotSupported { operation } => RefitError::not_supported(operation),
            PluginApiError::InvalidInput { message } => RefitError::invalid_request(message),
            PluginApiError::Parse {
                message,
                location: Some(at),
            } => RefitError::validation(format!(
                "Parse error: {} at {}:{}",
                message, at.line, at.column
            )),
            PluginApiError::Parse {
                message,
                location: None,
            } => RefitError::validation(format!("Parse error: {}", message)),
            PluginApiError::Internal { message } => RefitError::plugin("language", message),
        }
    }
}

/// Zero-based line and UTF-16 column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

// ============================================================================
// Core Plugin Trait
// ============================================================================

/// A language the engine can track references in
///
/// Each optional capability is its own trait; `None` means the engine uses
/// its generic detector or reports the operation as unsupported.
pub trait LanguagePlugin: Send + Sync {
    fn metadata(&self) -> &LanguageMetadata;

    /// Finds the module specifiers in a file
    fn import_parser(&self) -> Option<&dyn ImportParser> {
        None
    }

    /// Rewrites specifiers when a file is renamed in place
    fn import_rename_support(&self) -> Option<&dyn ImportRenameSupport> {
        None
    }

    /// Rewrites specifiers when a file changes directory
    fn import_move_support(&self) -> Option<&dyn ImportMoveSupport> {
        None
    }

    /// Extract, inline and delete-symbol planning
    fn refactoring_provider(&self) -> Option<&dyn RefactoringProvider> {
        None
    }

    fn handles_extension(&self, extension: &str) -> bool {
        self.metadata()
            .extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }
}

// ============================================================================
// Tests
// ============================================================================
