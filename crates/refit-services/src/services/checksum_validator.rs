//! Checksum validation for refactoring plans
//!
//! Validates that files haven't changed since a plan was created by comparing
//! SHA-256 checksums. This prevents applying stale plans to modified files.

use super::workspace_fs::WorkspaceFs;
use refit_foundation::{Plan, RefitError, RefitResult};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub struct ChecksumValidator;

impl ChecksumValidator {
    /// Hex-encoded SHA-256 of `content`
    pub fn calculate_checksum(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        format!("{:x}", hasher.finalize())
    }

    /// Checksums for `paths` as they are on disk now.
    pub async fn checksum_files(
        fs: &dyn WorkspaceFs,
        paths: &[PathBuf],
    ) -> RefitResult<BTreeMap<PathBuf, String>> {
        let mut checksums = BTreeMap::new();
        for path in paths {
            let content = fs
                .read(path)
                .await
                .map_err(|e| RefitError::io_at(path, e))?;
            checksums.insert(path.to_path_buf(), Self::calculate_checksum(&content));
        }
        Ok(checksums)
    }

    /// Validate all checksums in a plan against current file contents.
    ///
    /// # Errors
    ///
    /// - `NotFound` when a file recorded in the plan no longer exists
    /// - `StaleChecksum` when a file was modified after the plan was created
    pub async fn validate_checksums(fs: &dyn WorkspaceFs, plan: &Plan) -> RefitResult<()> {
        if plan.file_checksums.is_empty() {
            debug!("No checksums to validate");
            return Ok(());
        }

        debug!(checksum_count = plan.file_checksums.len(), "Validating checksums");

        for (file_path, expected) in &plan.file_checksums {
            let content = match fs.read(file_path).await {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(RefitError::file_not_found(file_path.display().to_string()));
                }
                Err(e) => return Err(RefitError::io_at(file_path, e)),
            };

            let actual = Self::calculate_checksum(&content);
            if &actual != expected {
                warn!(
                    file_path = %file_path.display(),
                    expected = %expected,
                    actual = %actual,
                    "Checksum mismatch - file has changed since plan was created"
                );
                return Err(RefitError::stale_checksum(
                    file_path.display().to_string(),
                    expected.clone(),
                    actual,
                ));
            }
        }

        info!(validated_files = plan.file_checksums.len(), "All checksums valid");
        Ok(())
    }
}
