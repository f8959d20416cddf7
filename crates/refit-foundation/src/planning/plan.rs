//! Refactor plans and the results of planning.

use super::edit::{EditLocation, WorkspaceEdit};
use super::operation::RefactorOperation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

/// Warning codes attached to plans.
pub mod warning_codes {
    pub const AMBIGUOUS_REFERENCE: &str = "AMBIGUOUS_REFERENCE";
    pub const DANGLING_REFERENCES: &str = "DANGLING_REFERENCES";
    pub const UNRESOLVED_REFERENCE: &str = "UNRESOLVED_REFERENCE";
    pub const AMBIGUOUS_SYMBOL: &str = "AMBIGUOUS_SYMBOL";
    pub const NO_REFERENCES: &str = "NO_REFERENCES";
    pub const SKIPPED_REFERENCE: &str = "SKIPPED_REFERENCE";
}

/// Message that does not block the plan but may need human attention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanWarning {
    pub code: String,
    pub message: String,
    /// Paths or symbols involved, for example each candidate of an ambiguous reference.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<String>,
}

impl PlanWarning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            candidates: Vec::new(),
        }
    }

    pub fn with_candidates(mut self, candidates: Vec<String>) -> Self {
        self.candidates = candidates;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Estimate of how far a change reaches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactAnalysis {
    pub risk: RiskLevel,
    pub dependent_files: Vec<PathBuf>,
    pub estimated_changes: usize,
    pub recommendations: Vec<String>,
}

impl Default for ImpactAnalysis {
    fn default() -> Self {
        Self {
            risk: RiskLevel::Low,
            dependent_files: Vec::new(),
            estimated_changes: 0,
            recommendations: Vec::new(),
        }
    }
}

/// A previewable bundle of edits with the checksums it was computed against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: Uuid,
    pub operation: RefactorOperation,
    pub edit: WorkspaceEdit,
    #[serde(default)]
    pub warnings: Vec<PlanWarning>,
    /// Every file the plan touches, sorted.
    pub affected_files: Vec<PathBuf>,
    pub estimated_change_count: usize,
    pub impact: ImpactAnalysis,
    /// SHA-256 (hex) of each existing file the plan reads or writes, captured at plan time.
    pub file_checksums: BTreeMap<PathBuf, String>,
    pub created_at: DateTime<Utc>,
}

impl Plan {
    pub fn new(operation: RefactorOperation, edit: WorkspaceEdit) -> Self {
        let affected_files = edit.touched_paths().into_iter().collect();
        let estimated_change_count = edit.edit_count() + edit.file_operations.len();
        Self {
            id: Uuid::new_v4(),
            operation,
            edit,
            warnings: Vec::new(),
            affected_files,
            estimated_change_count,
            impact: ImpactAnalysis::default(),
            file_checksums: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn risk(&self) -> RiskLevel {
        self.impact.risk
    }

    pub fn is_empty(&self) -> bool {
        self.edit.is_empty()
    }

    pub fn has_warning(&self, code: &str) -> bool {
        self.warnings.iter().any(|w| w.code == code)
    }
}

/// A place in a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub path: PathBuf,
    pub range: EditLocation,
}

/// A symbol that matched a name lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolCandidate {
    pub name: String,
    pub kind: String,
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

/// Result of planning: a ready plan, or candidates the caller must choose from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlanOutcome {
    Ready { plan: Box<Plan> },
    NeedsDisambiguation { candidates: Vec<SymbolCandidate> },
}

impl PlanOutcome {
    pub fn ready(plan: Plan) -> Self {
        PlanOutcome::Ready {
            plan: Box::new(plan),
        }
    }

    pub fn into_plan(self) -> Option<Plan> {
        match self {
            PlanOutcome::Ready { plan } => Some(*plan),
            PlanOutcome::NeedsDisambiguation { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Information,
    Hint,
}

/// Diagnostic reported by a code intelligence provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub path: PathBuf,
    pub range: EditLocation,
    pub severity: DiagnosticSeverity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planning::edit::{FileOperation, TextEdit};

    #[test]
    fn test_plan_counts_edits_and_operations() {
        let mut edit = WorkspaceEdit::new();
        edit.add_edit(
            "/p/b.ts",
            TextEdit::replace(EditLocation::on_line(0, 20, 5), "./a", "./lib/a"),
        );
        edit.add_operation(FileOperation::Move {
            from: "/p/a.ts".into(),
            to: "/p/lib/a.ts".into(),
            overwrite: false,
        });
        let op = RefactorOperation::Move {
            source: "/p/a.ts".into(),
            destination: "/p/lib/a.ts".into(),
            overwrite: false,
        };

        let plan = Plan::new(op, edit);
        assert_eq!(plan.estimated_change_count, 2);
        assert_eq!(plan.affected_files.len(), 3);
        assert_eq!(plan.risk(), RiskLevel::Low);
        assert!(!plan.is_empty());
    }

    #[test]
    fn test_outcome_serializes_with_status() {
        let outcome = PlanOutcome::NeedsDisambiguation {
            candidates: vec![SymbolCandidate {
                name: "helper".into(),
                kind: "function".into(),
                location: Location {
                    path: "/p/a.ts".into(),
                    range: EditLocation::on_line(3, 16, 6),
                },
                container: None,
            }],
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "needs_disambiguation");
        assert_eq!(json["candidates"][0]["name"], "helper");
        assert!(outcome.into_plan().is_none());
    }
}
