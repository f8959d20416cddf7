//! Parameter types and responses shared by the refactoring handlers

use super::tools::ToolHandlerContext;
use refit_foundation::{
    ApplyResult, EditLocation, PlanOutcome, Position, RefactorOperation, RefitError, RefitResult,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;

/// Options accepted by every planning tool
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOptions {
    /// Preview mode - plan and store, don't apply (default: true)
    #[serde(default = "crate::default_true")]
    pub dry_run: bool,
    /// Replace files already at a destination
    #[serde(default)]
    pub overwrite: bool,
}

// A missing `options` object goes through this impl, not the field defaults
impl Default for ToolOptions {
    fn default() -> Self {
        Self {
            dry_run: true,
            overwrite: false,
        }
    }
}

/// What a rename or delete is aimed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Symbol,
    File,
    Directory,
}

/// LSP-style range: zero-based lines, UTF-16 columns, exclusive end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RangeParam {
    pub start: Position,
    pub end: Position,
}

impl From<RangeParam> for EditLocation {
    fn from(range: RangeParam) -> Self {
        EditLocation::new(
            range.start.line,
            range.start.character,
            range.end.line,
            range.end.character,
        )
    }
}

pub(crate) fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Option<&Value>) -> RefitResult<T> {
    let args = arguments
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));
    serde_json::from_value(args)
        .map_err(|e| RefitError::invalid_request(format!("Invalid {} parameters: {}", tool, e)))
}

pub(crate) fn require<T>(value: Option<T>, field: &str, context: &str) -> RefitResult<T> {
    value.ok_or_else(|| {
        RefitError::invalid_request(format!("'{}' is required {}", field, context))
    })
}

/// Plan `operation`, then either preview and store it or apply it.
pub(crate) async fn plan_and_respond(
    context: &ToolHandlerContext,
    tool: &str,
    operation: RefactorOperation,
    options: &ToolOptions,
) -> RefitResult<Value> {
    let engine = &context.engine;
    let plan = match engine.plan(operation).await? {
        PlanOutcome::Ready { plan } => *plan,
        PlanOutcome::NeedsDisambiguation { candidates } => {
            info!(tool, candidates = candidates.len(), "Returning disambiguation candidates");
            return Ok(json!({
                "content": {
                    "status": "needs_disambiguation",
                    "candidates": serde_json::to_value(&candidates)?,
                }
            }));
        }
    };

    if options.dry_run {
        let preview = serde_json::to_value(engine.preview(&plan).await?)?;
        let plan_json = serde_json::to_value(&plan)?;
        let plan_id = engine.store_plan(plan);
        info!(tool, plan_id = %plan_id, dry_run = true, "Returning plan (preview mode)");
        Ok(json!({
            "content": {
                "status": "planned",
                "dryRun": true,
                "planId": plan_id.to_string(),
                "plan": plan_json,
                "preview": preview,
            }
        }))
    } else {
        info!(tool, plan_id = %plan.id, dry_run = false, "Applying plan");
        let result = engine.apply(&plan).await?;
        Ok(json!({ "content": apply_content(&result)? }))
    }
}

/// Response body for a finished apply.
pub(crate) fn apply_content(result: &ApplyResult) -> RefitResult<Value> {
    let status = if result.success {
        "applied"
    } else if result.workspace_restored() {
        "rolled_back"
    } else {
        "partially_restored"
    };
    Ok(json!({
        "status": status,
        "dryRun": false,
        "planId": result.plan_id.to_string(),
        "result": serde_json::to_value(result)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Deserialize)]
    struct WithOptions {
        #[serde(default)]
        options: ToolOptions,
    }

    #[test]
    fn test_dry_run_defaults_to_true() {
        let parsed: WithOptions = parse_args("t", Some(&json!({}))).unwrap();
        assert_eq!(parsed.options, ToolOptions::default());
        assert!(parsed.options.dry_run);

        let parsed: WithOptions = parse_args("t", Some(&json!({ "options": {} }))).unwrap();
        assert!(parsed.options.dry_run);

        let parsed: WithOptions =
            parse_args("t", Some(&json!({ "options": { "dryRun": false } }))).unwrap();
        assert!(!parsed.options.dry_run);
        assert!(!parsed.options.overwrite);
    }

    #[test]
    fn test_bad_arguments_are_invalid_request() {
        let err = parse_args::<WithOptions>("move", Some(&json!({ "options": { "dryRun": "yes" } })))
            .unwrap_err();
        assert!(matches!(err, RefitError::InvalidRequest { .. }));
    }

    #[test]
    fn test_range_conversion() {
        let range: RangeParam = serde_json::from_value(json!({
            "start": { "line": 1, "character": 4 },
            "end": { "line": 1, "character": 9 }
        }))
        .unwrap();
        assert_eq!(EditLocation::from(range), EditLocation::on_line(1, 4, 5));
    }
}
