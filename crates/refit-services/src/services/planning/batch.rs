//! Batch moves: N moves planned against one move map

use super::{Draft, PlanBuilder};
use crate::services::path_utils::display_relative;
use refit_foundation::{MoveSpec, RefitError, RefitResult};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

impl PlanBuilder {
    pub(super) async fn plan_batch_move(
        &self,
        moves: &[MoveSpec],
        overwrite: bool,
    ) -> RefitResult<Draft> {
        if moves.is_empty() {
            return Err(RefitError::invalid_request("Batch move needs at least one move"));
        }
        info!(moves = moves.len(), "Planning batch move");

        self.check_batch_conflicts(moves)?;

        let mut checked = Vec::with_capacity(moves.len());
        for m in moves {
            checked.push(
                self.check_move(&m.source, &m.destination, overwrite, None)
                    .await?,
            );
        }
        self.plan_checked_moves(&checked, overwrite).await
    }

    /// Destinations must be distinct and disjoint from every source.
    fn check_batch_conflicts(&self, moves: &[MoveSpec]) -> RefitResult<()> {
        let rel = |p: &Path| display_relative(&self.project_root, p);

        let mut destinations: HashMap<&Path, &Path> = HashMap::new();
        for m in moves {
            if let Some(previous) = destinations.insert(&m.destination, &m.source) {
                return Err(RefitError::conflict(
                    format!(
                        "{} and {} both move to {}",
                        rel(previous),
                        rel(&m.source),
                        rel(&m.destination)
                    ),
                    vec![
                        previous.display().to_string(),
                        m.source.display().to_string(),
                        m.destination.display().to_string(),
                    ],
                ));
            }
        }

        for (i, a) in moves.iter().enumerate() {
            for (j, b) in moves.iter().enumerate() {
                if i == j {
                    continue;
                }
                if a.destination == b.source || a.destination.starts_with(&b.source) {
                    return Err(RefitError::conflict(
                        format!(
                            "Destination {} overlaps {}, which is moved by the same batch",
                            rel(&a.destination),
                            rel(&b.source)
                        ),
                        vec![a.destination.display().to_string(), b.source.display().to_string()],
                    ));
                }
                if a.source.starts_with(&b.source) {
                    return Err(RefitError::conflict(
                        format!("{} is inside {}, which is also moved", rel(&a.source), rel(&b.source)),
                        vec![a.source.display().to_string(), b.source.display().to_string()],
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::Fixture;
    use pretty_assertions::assert_eq;
    use refit_foundation::{ErrorKind, MoveSpec, RefactorOperation};
    use std::fs;

    fn batch(pairs: &[(&str, &str)]) -> RefactorOperation {
        RefactorOperation::BatchMove {
            moves: pairs
                .iter()
                .map(|(s, d)| MoveSpec {
                    source: s.into(),
                    destination: d.into(),
                })
                .collect(),
            overwrite: false,
        }
    }

    #[tokio::test]
    async fn test_shared_destination_is_conflict_without_writes() {
        let fx = Fixture::new();
        let a = fx.write("a.md", "a\n");
        let c = fx.write("c.md", "c\n");

        let err = fx
            .builder()
            .build(batch(&[("a.md", "b.md"), ("c.md", "b.md")]))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(fs::read_to_string(a).unwrap(), "a\n");
        assert_eq!(fs::read_to_string(c).unwrap(), "c\n");
        assert!(!fx.root.join("b.md").exists());
    }

    #[tokio::test]
    async fn test_destination_equal_to_other_source_is_conflict() {
        let fx = Fixture::new();
        fx.write("a.md", "a\n");
        fx.write("b.md", "b\n");
        let err = fx
            .builder()
            .build(batch(&[("a.md", "b.md"), ("b.md", "c.md")]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_moved_files_referencing_each_other() {
        let fx = Fixture::new();
        let one = fx.write("docs/one.md", "Next: [two](two.md)\n");
        let two = fx.write("docs/two.md", "Back: [one](one.md)\n");
        let index = fx.write("index.md", "- [one](docs/one.md)\n- [two](docs/two.md)\n");

        let plan = fx
            .builder()
            .build(batch(&[("docs/one.md", "a/one.md"), ("docs/two.md", "b/two.md")]))
            .await
            .unwrap()
            .into_plan()
            .unwrap();

        assert_eq!(plan.edit.changes[&one][0].new_text, "../b/two.md");
        assert_eq!(plan.edit.changes[&two][0].new_text, "../a/one.md");
        let index_edits: Vec<&str> = plan.edit.changes[&index]
            .iter()
            .map(|e| e.new_text.as_str())
            .collect();
        assert_eq!(index_edits, vec!["a/one.md", "b/two.md"]);
        assert_eq!(plan.impact.dependent_files, vec![index]);
    }
}
