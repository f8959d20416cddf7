//! Centralized logging initialization with environment variable support

use crate::{AppConfig, LogFormat};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing subscriber with environment variable support
///
/// Environment variables (in priority order):
/// - `RUST_LOG`: Standard Rust log filter (takes precedence over all)
/// - `LOG_FORMAT`: Override format (json, pretty)
///
/// Logs always go to stderr. Calling this twice is a no-op for the second call.
///
/// ```bash
/// # Module-specific filtering
/// RUST_LOG=refit_services=debug,refit_lsp=info LOG_FORMAT=json my-host
/// ```
pub fn initialize(config: &AppConfig) {
    let log_level = config
        .logging
        .level
        .parse()
        .unwrap_or(tracing::Level::INFO);

    // RUST_LOG directives are kept, the configured level is appended as the default
    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let format = format_override().unwrap_or(config.logging.format);

    let result = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already initialized");
    }
}

fn format_override() -> Option<LogFormat> {
    std::env::var("LOG_FORMAT")
        .ok()
        .and_then(|f| match f.to_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "pretty" | "human" => Some(LogFormat::Pretty),
            _ => None,
        })
}

/// Create a request span with standard fields for context propagation
///
/// Tool handlers open this around each call so nested engine logs carry
/// the request id and tool name.
///
/// ```rust
/// use refit_config::logging::request_span;
///
/// let span = request_span("req-12345", "rename");
/// let _enter = span.enter();
/// tracing::info!("Processing request");
/// ```
pub fn request_span(request_id: &str, tool: &str) -> tracing::Span {
    tracing::info_span!(
        "request",
        request_id = %request_id,
        tool = %tool
    )
}
