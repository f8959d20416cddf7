//! Post-apply validation
//!
//! Runs after every write of an apply has landed and before the transaction
//! commits. A failing check rolls the whole apply back.

use async_trait::async_trait;
use refit_config::ValidationConfig;
use refit_foundation::{RefitError, RefitResult, ValidationResult};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

/// Check run against the written workspace.
///
/// `Ok` with `passed == false` and `Err` both trigger a rollback; only the
/// latter is reported as an error in the apply result.
#[async_trait]
pub trait VerificationHook: Send + Sync {
    async fn verify(&self, project_root: &Path) -> RefitResult<ValidationResult>;
}

/// Runs a shell command with a timeout and captures its output.
pub struct PostApplyValidator {
    config: ValidationConfig,
}

impl PostApplyValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn command(&self) -> &str {
        &self.config.command
    }

    /// Run the configured command in `working_dir`.
    pub async fn run_validation(&self, working_dir: &Path) -> RefitResult<ValidationResult> {
        let start = Instant::now();

        debug!(
            command = %self.config.command,
            working_dir = %working_dir.display(),
            timeout_seconds = self.config.timeout_seconds,
            "Running validation command"
        );

        #[cfg(unix)]
        let mut cmd = Command::new("sh");
        #[cfg(unix)]
        cmd.arg("-c");

        #[cfg(windows)]
        let mut cmd = Command::new("cmd.exe");
        #[cfg(windows)]
        cmd.arg("/C");

        cmd.arg(&self.config.command)
            .current_dir(working_dir)
            .kill_on_drop(true);

        let timeout = Duration::from_secs(self.config.timeout_seconds);
        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| {
                RefitError::timeout(
                    format!("validation command '{}'", self.config.command),
                    Some(timeout.as_millis() as u64),
                )
            })?
            .map_err(|e| {
                RefitError::internal(format!("Failed to execute validation command: {}", e))
            })?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code();
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        let passed = output.status.success() && (!self.config.fail_on_stderr || stderr.is_empty());

        debug!(
            ?exit_code,
            duration_ms,
            passed,
            stderr_len = stderr.len(),
            "Validation command completed"
        );

        Ok(ValidationResult {
            passed,
            command: self.config.command.clone(),
            exit_code,
            stdout,
            stderr,
            duration_ms,
        })
    }
}

#[async_trait]
impl VerificationHook for PostApplyValidator {
    async fn verify(&self, project_root: &Path) -> RefitResult<ValidationResult> {
        self.run_validation(project_root).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use refit_foundation::ErrorKind;

    fn validator(command: &str, timeout_seconds: u64, fail_on_stderr: bool) -> PostApplyValidator {
        PostApplyValidator::new(ValidationConfig {
            enabled: true,
            command: command.to_string(),
            timeout_seconds,
            fail_on_stderr,
        })
    }

    #[tokio::test]
    async fn test_validation_successful_command() {
        let dir = tempfile::tempdir().unwrap();
        let result = validator("echo 'success'", 5, false)
            .run_validation(dir.path())
            .await
            .unwrap();

        assert!(result.passed);
        assert_eq!(result.exit_code, Some(0));
        assert!(result.stdout.contains("success"));
    }

    #[tokio::test]
    async fn test_validation_failed_command() {
        let dir = tempfile::tempdir().unwrap();
        let result = validator("exit 3", 5, false)
            .run_validation(dir.path())
            .await
            .unwrap();

        assert!(!result.passed);
        assert_eq!(result.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_validation_stderr_handling() {
        let dir = tempfile::tempdir().unwrap();
        let lenient = validator("echo 'error' >&2", 5, false)
            .run_validation(dir.path())
            .await
            .unwrap();
        assert!(lenient.passed);

        let strict = validator("echo 'error' >&2", 5, true)
            .run_validation(dir.path())
            .await
            .unwrap();
        assert!(!strict.passed);
        assert!(strict.stderr.contains("error"));
    }

    #[tokio::test]
    async fn test_validation_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let err = validator("sleep 10", 1, false)
            .run_validation(dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, RefitError::Timeout { .. }));
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_runs_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
        let result = validator("cat marker.txt", 5, false)
            .verify(dir.path())
            .await
            .unwrap();
        assert!(result.passed);
        assert_eq!(result.stdout, "here");
    }
}
