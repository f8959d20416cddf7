//! Apply results, transaction states and previews.

use super::plan::{ImpactAnalysis, PlanWarning};
use crate::errors::ErrorResponse;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// States of an apply transaction, in the order they are normally visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyState {
    Validating,
    Locking,
    Snapshotting,
    Writing,
    Verifying,
    Committed,
    RollingBack,
    RolledBack,
    Released,
}

impl std::fmt::Display for ApplyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ApplyState::Validating => "validating",
            ApplyState::Locking => "locking",
            ApplyState::Snapshotting => "snapshotting",
            ApplyState::Writing => "writing",
            ApplyState::Verifying => "verifying",
            ApplyState::Committed => "committed",
            ApplyState::RollingBack => "rolling_back",
            ApplyState::RolledBack => "rolled_back",
            ApplyState::Released => "released",
        };
        f.write_str(name)
    }
}

/// Outcome of a post-apply validation command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub passed: bool,
    pub command: String,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

/// A file that could not be put back during rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreFailure {
    pub path: PathBuf,
    pub error: String,
    /// Bytes captured before writing, kept for manual recovery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_content: Option<Vec<u8>>,
    /// What is on disk at `path` after the failed restore, when readable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_content: Option<Vec<u8>>,
    /// Where the file survives when it could not be put back at `path`,
    /// such as the destination of a move.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserved_at: Option<PathBuf>,
}

/// Result of applying a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResult {
    pub plan_id: Uuid,
    pub success: bool,
    pub final_state: ApplyState,
    /// States visited, in order.
    pub state_history: Vec<ApplyState>,
    pub files_modified: Vec<PathBuf>,
    pub files_created: Vec<PathBuf>,
    pub files_deleted: Vec<PathBuf>,
    pub rolled_back: bool,
    pub restored_files: Vec<PathBuf>,
    pub restore_failures: Vec<RestoreFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn new(plan_id: Uuid) -> Self {
        Self {
            plan_id,
            success: false,
            final_state: ApplyState::Validating,
            state_history: Vec::new(),
            files_modified: Vec::new(),
            files_created: Vec::new(),
            files_deleted: Vec::new(),
            rolled_back: false,
            restored_files: Vec::new(),
            restore_failures: Vec::new(),
            validation: None,
            error: None,
            duration_ms: 0,
        }
    }

    /// Whether the workspace was left exactly as it was before the apply.
    pub fn workspace_restored(&self) -> bool {
        !self.success && self.restore_failures.is_empty()
    }

    pub fn visited(&self, state: ApplyState) -> bool {
        self.state_history.contains(&state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileChangeStatus {
    Modified,
    Created,
    Moved,
    Deleted,
}

/// Rendered view of one file after a plan is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePreview {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_path: Option<PathBuf>,
    pub status: FileChangeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
    /// Content after the plan; `None` for deletions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered: Option<String>,
}

/// Preview of an entire plan, computed without touching disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    pub plan_id: Uuid,
    pub files: Vec<FilePreview>,
    pub warnings: Vec<PlanWarning>,
    pub impact: ImpactAnalysis,
}

impl Preview {
    pub fn file(&self, path: &std::path::Path) -> Option<&FilePreview> {
        self.files
            .iter()
            .find(|f| f.path == path || f.new_path.as_deref() == Some(path))
    }
}
