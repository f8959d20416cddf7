//! From implementations for standard library types

use super::RefitError;

impl From<std::io::Error> for RefitError {
    fn from(err: std::io::Error) -> Self {
        RefitError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for RefitError {
    fn from(err: serde_json::Error) -> Self {
        RefitError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{error_codes, ErrorKind};

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RefitError = io_err.into();
        assert!(matches!(err, RefitError::Io { .. }));
        assert_eq!(err.error_code(), error_codes::E1000_INTERNAL_SERVER_ERROR);
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: RefitError = json_err.into();
        assert!(matches!(err, RefitError::Json { .. }));
        assert_eq!(err.error_code(), error_codes::E1008_INVALID_DATA);
    }
}
