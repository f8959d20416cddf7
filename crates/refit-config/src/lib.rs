//! Configuration management for refit
//!
//! This crate provides the application configuration types, their layered
//! loading logic, and tracing initialisation.

pub mod config;
pub mod logging;

// Re-export commonly used types at the crate root for convenience
pub use config::{
    AppConfig, CacheConfig, LogFormat, LoggingConfig, LspConfig, LspServerConfig,
    RefactorConfig, ValidationConfig, DEFAULT_IGNORED_DIRS, DEFAULT_TEXT_EXTENSIONS,
};
