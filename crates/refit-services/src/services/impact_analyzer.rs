//! Risk classification for planned operations
//!
//! Pure functions of the dependent-file count; no locks, no I/O.

use refit_foundation::{ImpactAnalysis, RiskLevel};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Highest dependent count still rated `Low`
pub const LOW_RISK_MAX: usize = 3;
/// Highest dependent count still rated `Medium`
pub const MEDIUM_RISK_MAX: usize = 10;
/// Above this many dependents, suggest splitting the change
pub const BATCH_SPLIT_THRESHOLD: usize = 25;

pub struct ImpactAnalyzer;

impl ImpactAnalyzer {
    pub fn classify(dependent_count: usize) -> RiskLevel {
        match dependent_count {
            0..=LOW_RISK_MAX => RiskLevel::Low,
            n if n <= MEDIUM_RISK_MAX => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }

    /// Build the analysis for a set of dependent files.
    pub fn analyze(
        dependents: impl IntoIterator<Item = PathBuf>,
        estimated_changes: usize,
        symbol_rename: bool,
    ) -> ImpactAnalysis {
        let dependent_files: Vec<PathBuf> = dependents
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let count = dependent_files.len();
        let risk = Self::classify(count);

        let mut recommendations = Vec::new();
        if risk == RiskLevel::High {
            recommendations.push("Preview the plan before applying".to_string());
        }
        if count > BATCH_SPLIT_THRESHOLD {
            recommendations.push("Split the change into smaller batches".to_string());
        }
        if symbol_rename && count > 0 {
            recommendations.push(
                "Review the generated edits for dynamic or string-based references".to_string(),
            );
        }
        if count == 0 {
            recommendations
                .push("No dependent files found; the change is self-contained".to_string());
        }

        ImpactAnalysis {
            risk,
            dependent_files,
            estimated_changes,
            recommendations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn files(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("/p/f{}.ts", i))).collect()
    }

    #[test]
    fn test_thresholds() {
        assert_eq!(ImpactAnalyzer::classify(0), RiskLevel::Low);
        assert_eq!(ImpactAnalyzer::classify(3), RiskLevel::Low);
        assert_eq!(ImpactAnalyzer::classify(4), RiskLevel::Medium);
        assert_eq!(ImpactAnalyzer::classify(10), RiskLevel::Medium);
        assert_eq!(ImpactAnalyzer::classify(11), RiskLevel::High);
    }

    #[test]
    fn test_recommendations_for_large_symbol_rename() {
        let analysis = ImpactAnalyzer::analyze(files(30), 40, true);
        assert_eq!(analysis.risk, RiskLevel::High);
        assert_eq!(
            analysis.recommendations,
            vec![
                "Preview the plan before applying",
                "Split the change into smaller batches",
                "Review the generated edits for dynamic or string-based references",
            ]
        );
    }

    #[test]
    fn test_self_contained_change() {
        let analysis = ImpactAnalyzer::analyze(Vec::new(), 1, false);
        assert_eq!(analysis.risk, RiskLevel::Low);
        assert_eq!(
            analysis.recommendations,
            vec!["No dependent files found; the change is self-contained"]
        );
    }

    #[test]
    fn test_dependents_are_deduplicated_and_sorted() {
        let analysis = ImpactAnalyzer::analyze(
            vec![PathBuf::from("/p/b.ts"), PathBuf::from("/p/a.ts"), PathBuf::from("/p/b.ts")],
            2,
            false,
        );
        assert_eq!(
            analysis.dependent_files,
            vec![PathBuf::from("/p/a.ts"), PathBuf::from("/p/b.ts")]
        );
    }
}
