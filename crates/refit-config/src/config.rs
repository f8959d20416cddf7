//! Application configuration

use refit_foundation::{RefitError, RefitResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Extensions scanned by the generic text detector when no plugin claims them.
pub const DEFAULT_TEXT_EXTENSIONS: &[&str] = &[
    "md", "markdown", "txt", "rst", "adoc", "toml", "yaml", "yml", "json",
];

/// Directories never scanned for references.
pub const DEFAULT_IGNORED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "dist",
    "build",
    ".next",
    "coverage",
    "__pycache__",
];

const CONFIG_FILES: &[&str] = &["refit.toml", ".refit/config.toml"];
const ENV_PREFIX: &str = "REFIT__";

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Logging configuration
    pub logging: LoggingConfig,
    /// LSP configuration
    pub lsp: LspConfig,
    /// Refactor engine configuration
    pub refactor: RefactorConfig,
    /// Import cache configuration
    pub cache: CacheConfig,
    /// Post-apply validation configuration
    pub validation: ValidationConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Structured JSON, one object per line
    Json,
    /// Human-readable multi-line output
    Pretty,
}

/// LSP server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LspConfig {
    /// List of LSP server configurations
    pub servers: Vec<LspServerConfig>,
    /// Timeout for a single LSP request in milliseconds
    pub request_timeout_ms: u64,
}

/// Individual LSP server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LspServerConfig {
    /// File extensions this server handles
    pub extensions: Vec<String>,
    /// Command to run the LSP server
    pub command: Vec<String>,
    /// Working directory (optional)
    #[serde(default)]
    pub root_dir: Option<PathBuf>,
    /// Sent verbatim as `initializationOptions` in the initialize request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialization_options: Option<serde_json::Value>,
}

/// Refactor engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RefactorConfig {
    /// Bounded wait for acquiring all file locks of one apply
    pub lock_timeout_ms: u64,
    /// Extra extensions handed to the generic text detector
    pub text_extensions: Vec<String>,
    /// Extra directory names excluded from scanning
    pub ignored_dirs: Vec<String>,
    /// Files larger than this are not scanned for references
    pub max_file_size_bytes: u64,
    /// Stored plans, and the record of applied ones, are dropped after this long
    pub plan_ttl_seconds: u64,
    /// Upper bound on stored plans; the oldest go first
    pub max_stored_plans: usize,
}

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    /// Enable the import cache
    pub enabled: bool,
}

/// Validation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationConfig {
    /// Run the command after writing and roll back when it fails
    pub enabled: bool,
    /// Shell command, run with the project root as working directory
    pub command: String,
    /// Kill the command after this many seconds
    pub timeout_seconds: u64,
    /// Treat any stderr output as failure
    pub fail_on_stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Default for LspConfig {
    fn default() -> Self {
        Self {
            servers: vec![LspServerConfig {
                extensions: vec![
                    "ts".to_string(),
                    "tsx".to_string(),
                    "js".to_string(),
                    "jsx".to_string(),
                ],
                command: vec![
                    "typescript-language-server".to_string(),
                    "--stdio".to_string(),
                ],
                root_dir: None,
                initialization_options: None,
            }],
            request_timeout_ms: 30_000,
        }
    }
}

impl Default for RefactorConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5_000,
            text_extensions: Vec::new(),
            ignored_dirs: Vec::new(),
            max_file_size_bytes: 2 * 1024 * 1024, // 2 MB
            plan_ttl_seconds: 3_600,
            max_stored_plans: 256,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: "npx tsc --noEmit".to_string(),
            timeout_seconds: 120,
            fail_on_stderr: false,
        }
    }
}

impl RefactorConfig {
    /// Built-in text extensions plus the configured ones.
    pub fn all_text_extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = DEFAULT_TEXT_EXTENSIONS
            .iter()
            .map(|e| e.to_string())
            .collect();
        for ext in &self.text_extensions {
            let ext = ext.trim_start_matches('.').to_lowercase();
            if !exts.contains(&ext) {
                exts.push(ext);
            }
        }
        exts
    }

    /// Built-in ignored directories plus the configured ones.
    pub fn all_ignored_dirs(&self) -> Vec<String> {
        let mut dirs: Vec<String> = DEFAULT_IGNORED_DIRS.iter().map(|d| d.to_string()).collect();
        for dir in &self.ignored_dirs {
            if !dirs.contains(dir) {
                dirs.push(dir.clone());
            }
        }
        dirs
    }
}

impl AppConfig {
    /// Load configuration from the current directory and environment
    pub fn load() -> RefitResult<Self> {
        Self::load_from(Path::new("."))
    }

    /// Load configuration rooted at `root`
    ///
    /// Priority order (highest to lowest):
    /// 1. Environment variables (`REFIT__*`, nested keys split on `__`)
    /// 2. `refit.toml` or `.refit/config.toml` under `root` (first found)
    /// 3. Default values
    pub fn load_from(root: &Path) -> RefitResult<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Toml},
            Figment,
        };

        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

        for candidate in CONFIG_FILES {
            let path = root.join(candidate);
            if path.exists() {
                tracing::info!(path = %path.display(), "Loading TOML configuration");
                figment = figment.merge(Toml::file(&path));
                break; // Use first found TOML file
            }
        }

        // `lowercase` must come last: every adapter before it resets the flag
        let figment = figment.merge(
            Env::prefixed(ENV_PREFIX)
                .split("__")
                .map(|key| snake_to_camel(&key.as_str().to_ascii_lowercase()).into())
                .lowercase(false),
        );

        let config: AppConfig = figment
            .extract()
            .map_err(|e| RefitError::config(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;

        tracing::debug!(
            lsp_servers = config.lsp.servers.len(),
            lock_timeout_ms = config.refactor.lock_timeout_ms,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Parse configuration from a TOML string, filling missing keys with defaults
    pub fn from_toml_str(content: &str) -> RefitResult<Self> {
        let config: AppConfig = toml::from_str(content)
            .map_err(|e| RefitError::config(format!("Invalid TOML configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration as TOML
    pub fn save(&self, path: &Path) -> RefitResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RefitError::io_at(parent, e))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| RefitError::config(format!("Failed to serialize configuration: {}", e)))?;
        std::fs::write(path, content).map_err(|e| RefitError::io_at(path, e))
    }

    /// Validate the configuration
    pub fn validate(&self) -> RefitResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(RefitError::config(format!(
                "Invalid log level '{}', must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        if self.lsp.request_timeout_ms == 0 {
            return Err(RefitError::config("LSP request timeout cannot be 0"));
        }

        for server in &self.lsp.servers {
            if server.extensions.is_empty() {
                return Err(RefitError::config(
                    "LSP server must handle at least one extension",
                ));
            }
            if server.command.is_empty() || server.command[0].trim().is_empty() {
                return Err(RefitError::config("LSP server command cannot be empty"));
            }
        }

        if self.refactor.lock_timeout_ms == 0 {
            return Err(RefitError::config("Lock timeout cannot be 0"));
        }

        if self.refactor.max_stored_plans == 0 {
            return Err(RefitError::config("max_stored_plans cannot be 0"));
        }

        if self.validation.enabled {
            if self.validation.command.trim().is_empty() {
                return Err(RefitError::config(
                    "Validation command cannot be empty when validation is enabled",
                ));
            }
            if self.validation.timeout_seconds == 0 {
                return Err(RefitError::config("Validation timeout cannot be 0"));
            }
        }

        Ok(())
    }
}

/// `lsp.request_timeout_ms` -> `lsp.requestTimeoutMs`
fn snake_to_camel(key: &str) -> String {
    key.split('.')
        .map(|segment| {
            let mut out = String::with_capacity(segment.len());
            let mut upper = false;
            for ch in segment.chars() {
                if ch == '_' {
                    upper = true;
                } else if upper {
                    out.extend(ch.to_uppercase());
                    upper = false;
                } else {
                    out.push(ch);
                }
            }
            out
        })
        .collect::<Vec<_>>()
        .join(".")
}
