//! Unified error handling for refit
//!
//! Every fallible operation in the workspace returns [`RefitResult`]. Variants
//! carry structured context; [`RefitError::kind`] folds them into the five
//! caller-facing classes (validation, conflict, not found, unavailable,
//! internal) and [`ErrorResponse`] is the serialisable form.

mod codes;
mod conversions;
mod response;

pub use codes::error_codes;
pub use response::ErrorResponse;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller-facing error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A precondition failed before any mutation. Safe to fix and retry.
    Validation,
    /// Two edits or operations collide, or a lock could not be obtained.
    Conflict,
    /// A file, directory or symbol does not exist.
    NotFound,
    /// An external dependency is degraded. Recoverable via retry or restart.
    Unavailable,
    /// Unexpected state.
    Internal,
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RefitError {
    // ============================================
    // Configuration
    // ============================================
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // ============================================
    // Resource & File System
    // ============================================
    #[error("Resource not found: {resource}")]
    NotFound {
        resource: String,
        resource_type: Option<String>,
    },

    #[error("Resource already exists: {resource}")]
    AlreadyExists {
        resource: String,
        resource_type: Option<String>,
    },

    #[error("Symbol not found: {symbol}")]
    SymbolNotFound {
        symbol: String,
        file: Option<String>,
    },

    #[error("I/O error: {message}")]
    Io {
        message: String,
        path: Option<String>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // ============================================
    // Validation
    // ============================================
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        expected: Option<String>,
        actual: Option<String>,
    },

    #[error("File '{path}' has changed since the plan was created (expected checksum {expected}, found {actual})")]
    StaleChecksum {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid request: {message}")]
    InvalidRequest {
        message: String,
        parameter: Option<String>,
    },

    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    // ============================================
    // Conflicts
    // ============================================
    #[error("Conflict: {message}")]
    Conflict { message: String, paths: Vec<String> },

    #[error("Busy: could not lock '{path}' within {waited_ms}ms")]
    Busy { path: String, waited_ms: u64 },

    // ============================================
    // External services & capabilities
    // ============================================
    #[error("Service unavailable ({service}): {message}")]
    Unavailable { service: String, message: String },

    #[error("Timeout during: {operation}")]
    Timeout {
        operation: String,
        duration_ms: Option<u64>,
    },

    #[error("Operation not supported: {operation}")]
    NotSupported {
        operation: String,
        reason: Option<String>,
    },

    #[error("LSP error: {message}")]
    Lsp {
        message: String,
        server: Option<String>,
        method: Option<String>,
    },

    #[error("Plugin error ({plugin}): {message}")]
    Plugin {
        plugin: String,
        message: String,
        operation: Option<String>,
    },

    // ============================================
    // Runtime
    // ============================================
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl RefitError {
    // ============================================
    // Constructor methods
    // ============================================

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            resource_type: None,
        }
    }

    /// Not-found error for a filesystem path.
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::NotFound {
            resource: path.into(),
            resource_type: Some("file".to_string()),
        }
    }

    pub fn already_exists(resource: impl Into<String>) -> Self {
        Self::AlreadyExists {
            resource: resource.into(),
            resource_type: None,
        }
    }

    pub fn symbol_not_found(symbol: impl Into<String>, file: Option<String>) -> Self {
        Self::SymbolNotFound {
            symbol: symbol.into(),
            file,
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            path: None,
            source: None,
        }
    }

    /// Wrap an I/O error with the path that produced it.
    pub fn io_at(path: &std::path::Path, err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{}: {}", path.display(), err),
            path: Some(path.display().to_string()),
            source: Some(err),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
            expected: None,
            actual: None,
        }
    }

    pub fn stale_checksum(
        path: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::StaleChecksum {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            parameter: None,
        }
    }

    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    pub fn conflict(message: impl Into<String>, paths: Vec<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            paths,
        }
    }

    pub fn busy(path: impl Into<String>, waited_ms: u64) -> Self {
        Self::Busy {
            path: path.into(),
            waited_ms,
        }
    }

    pub fn unavailable(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, duration_ms: Option<u64>) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_ms,
        }
    }

    pub fn not_supported(operation: impl Into<String>) -> Self {
        Self::NotSupported {
            operation: operation.into(),
            reason: None,
        }
    }

    pub fn lsp(message: impl Into<String>) -> Self {
        Self::Lsp {
            message: message.into(),
            server: None,
            method: None,
        }
    }

    pub fn plugin(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Plugin {
            plugin: plugin.into(),
            message: message.into(),
            operation: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    // ============================================
    // Metadata methods
    // ============================================

    /// The caller-facing class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RefitError::Validation { .. }
            | RefitError::StaleChecksum { .. }
            | RefitError::InvalidRequest { .. }
            | RefitError::Cancelled { .. }
            | RefitError::AlreadyExists { .. } => ErrorKind::Validation,
            RefitError::Conflict { .. } | RefitError::Busy { .. } => ErrorKind::Conflict,
            RefitError::NotFound { .. } | RefitError::SymbolNotFound { .. } => {
                ErrorKind::NotFound
            }
            RefitError::Unavailable { .. }
            | RefitError::Timeout { .. }
            | RefitError::Lsp { .. }
            | RefitError::NotSupported { .. } => ErrorKind::Unavailable,
            RefitError::Io { .. }
            | RefitError::Json { .. }
            | RefitError::Config { .. }
            | RefitError::Plugin { .. }
            | RefitError::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn error_code(&self) -> &'static str {
        use error_codes::*;
        match self {
            RefitError::Config { .. } => E1019_CONFIG_ERROR,
            RefitError::NotFound { .. } => E1006_RESOURCE_NOT_FOUND,
            RefitError::AlreadyExists { .. } => E1022_ALREADY_EXISTS,
            RefitError::SymbolNotFound { .. } => E1034_SYMBOL_NOT_FOUND,
            RefitError::Io { .. } => E1000_INTERNAL_SERVER_ERROR,
            RefitError::Json { .. } => E1008_INVALID_DATA,
            RefitError::Validation { .. } => E1010_VALIDATION_ERROR,
            RefitError::StaleChecksum { .. } => E1030_STALE_CHECKSUM,
            RefitError::InvalidRequest { .. } => E1001_INVALID_REQUEST,
            RefitError::Cancelled { .. } => E1035_CANCELLED,
            RefitError::Conflict { .. } => E1031_CONFLICT,
            RefitError::Busy { .. } => E1032_BUSY,
            RefitError::Unavailable { .. } => E1033_UNAVAILABLE,
            RefitError::Timeout { .. } => E1004_TIMEOUT,
            RefitError::NotSupported { .. } => E1007_NOT_SUPPORTED,
            RefitError::Lsp { .. } => E1003_LSP_ERROR,
            RefitError::Plugin { .. } => E1014_PLUGIN_ERROR,
            RefitError::Internal { .. } => E1000_INTERNAL_SERVER_ERROR,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            RefitError::Config { .. } => "config_error",
            RefitError::NotFound { .. } => "not_found",
            RefitError::AlreadyExists { .. } => "already_exists",
            RefitError::SymbolNotFound { .. } => "symbol_not_found",
            RefitError::Io { .. } => "io_error",
            RefitError::Json { .. } => "json_error",
            RefitError::Validation { .. } => "validation_error",
            RefitError::StaleChecksum { .. } => "stale_checksum",
            RefitError::InvalidRequest { .. } => "invalid_request",
            RefitError::Cancelled { .. } => "cancelled",
            RefitError::Conflict { .. } => "conflict",
            RefitError::Busy { .. } => "busy",
            RefitError::Unavailable { .. } => "unavailable",
            RefitError::Timeout { .. } => "timeout",
            RefitError::NotSupported { .. } => "not_supported",
            RefitError::Lsp { .. } => "lsp_error",
            RefitError::Plugin { .. } => "plugin_error",
            RefitError::Internal { .. } => "internal_error",
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::Conflict | ErrorKind::NotFound
        ) || matches!(self, RefitError::NotSupported { .. })
    }

    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Whether retrying the same request later may succeed unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RefitError::Busy { .. }
                | RefitError::Unavailable { .. }
                | RefitError::Timeout { .. }
                | RefitError::Lsp { .. }
        )
    }
}

pub type RefitResult<T> = Result<T, RefitError>;
