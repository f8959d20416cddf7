//! Serialisable error form carried in tool responses and apply results

use super::{ErrorKind, RefitError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code (E1000, E1001, etc.)
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Error category for structured logging
    pub category: String,
    /// Caller-facing error class
    pub kind: ErrorKind,
    /// Whether the same request may succeed if retried
    #[serde(default)]
    pub retryable: bool,
    /// Optional additional context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Optional actionable suggestion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ErrorResponse {
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl From<&RefitError> for ErrorResponse {
    fn from(err: &RefitError) -> Self {
        let details = match err {
            RefitError::Conflict { paths, .. } if !paths.is_empty() => {
                Some(json!({ "paths": paths }))
            }
            RefitError::StaleChecksum {
                path,
                expected,
                actual,
            } => Some(json!({ "path": path, "expected": expected, "actual": actual })),
            RefitError::Busy { path, waited_ms } => {
                Some(json!({ "path": path, "waitedMs": waited_ms }))
            }
            _ => None,
        };

        let suggestion = match err {
            RefitError::StaleChecksum { .. } => {
                Some("Regenerate the plan against the current file contents".to_string())
            }
            RefitError::Busy { .. } => {
                Some("Another apply holds these files; retry once it finishes".to_string())
            }
            RefitError::Unavailable { .. } | RefitError::Timeout { .. } => {
                Some("Restart the code intelligence service and retry".to_string())
            }
            _ => None,
        };

        ErrorResponse {
            code: err.error_code().to_string(),
            message: err.to_string(),
            category: err.category().to_string(),
            kind: err.kind(),
            retryable: err.is_retryable(),
            details,
            suggestion,
        }
    }
}

impl From<RefitError> for ErrorResponse {
    fn from(err: RefitError) -> Self {
        ErrorResponse::from(&err)
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, " (details: {})", details)?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorResponse {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::error_codes;

    #[test]
    fn test_error_response_conversion() {
        let err = RefitError::NotFound {
            resource: "file.rs".to_string(),
            resource_type: Some("file".to_string()),
        };

        let response = ErrorResponse::from(err);
        assert_eq!(response.code, error_codes::E1006_RESOURCE_NOT_FOUND);
        assert!(response.message.contains("file.rs"));
        assert_eq!(response.category, "not_found");
        assert_eq!(response.kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_stale_checksum_carries_details() {
        let response = ErrorResponse::from(RefitError::stale_checksum("a.ts", "111", "222"));
        let details = response.details.expect("details");
        assert_eq!(details["path"], "a.ts");
        assert!(response.suggestion.is_some());
    }

    #[test]
    fn test_error_response_display() {
        let response = ErrorResponse::from(RefitError::busy("src/a.ts", 250));
        let display = response.to_string();
        assert!(display.starts_with("[E1032]"));
        assert!(display.contains("Suggestion:"));
        assert!(response.retryable);
    }
}
