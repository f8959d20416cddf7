//! Tool calls routed through the registry against a real workspace

use pretty_assertions::assert_eq;
use refit_foundation::{EditLocation, Location, RefitError, SymbolCandidate};
use refit_handlers::{ToolCall, ToolHandlerContext, ToolRegistry};
use refit_test_support::{create_test_config, FakeCodeIntelligence, TestWorkspace};
use serde_json::json;
use std::sync::Arc;

fn context(workspace: &TestWorkspace) -> ToolHandlerContext {
    ToolHandlerContext::new(workspace.engine())
}

fn fixture() -> TestWorkspace {
    let workspace = TestWorkspace::new();
    workspace.setup_typescript_project("dispatch");
    workspace.create_file("src/a.ts", "export const a = 1;\n");
    workspace.create_file("src/b.ts", "import { a } from './a';\n");
    workspace
}

#[tokio::test]
async fn test_dry_run_by_default_then_apply_plan() {
    let workspace = fixture();
    let context = context(&workspace);
    let registry = ToolRegistry::with_refactoring_tools();
    let before = workspace.fingerprint();

    let planned = registry
        .handle_tool(
            ToolCall::new("move", json!({ "source": "src/a.ts", "destination": "lib/a.ts" })),
            &context,
        )
        .await
        .unwrap();
    let content = &planned["content"];
    assert_eq!(content["status"], "planned");
    assert_eq!(content["dryRun"], true);
    assert!(content["preview"]["files"].as_array().is_some_and(|f| !f.is_empty()));
    assert_eq!(workspace.fingerprint(), before);
    assert_eq!(context.engine.pending_plans(), 1);

    let plan_id = content["planId"].as_str().unwrap().to_string();
    let applied = registry
        .handle_tool(ToolCall::new("apply_plan", json!({ "planId": &plan_id })), &context)
        .await
        .unwrap();
    assert_eq!(applied["content"]["status"], "applied");
    assert_eq!(applied["content"]["result"]["success"], true);
    assert!(workspace.file_exists("lib/a.ts"));
    assert_eq!(workspace.read_file("src/b.ts"), "import { a } from '../lib/a';\n");

    // A plan applies at most once
    let err = registry
        .handle_tool(ToolCall::new("apply_plan", json!({ "planId": &plan_id })), &context)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RefitError::InvalidRequest { .. } | RefitError::NotFound { .. }
    ));
}

#[tokio::test]
async fn test_dry_run_false_applies_directly() {
    let workspace = fixture();
    let context = context(&workspace);
    let registry = ToolRegistry::with_refactoring_tools();

    let applied = registry
        .handle_tool(
            ToolCall::new(
                "rename",
                json!({
                    "target": { "kind": "file", "path": "src/a.ts" },
                    "newName": "src/alpha.ts",
                    "options": { "dryRun": false }
                }),
            ),
            &context,
        )
        .await
        .unwrap();
    assert_eq!(applied["content"]["status"], "applied");
    assert_eq!(context.engine.pending_plans(), 0);
    assert!(workspace.file_exists("src/alpha.ts"));
    assert!(!workspace.file_exists("src/a.ts"));
    assert_eq!(workspace.read_file("src/b.ts"), "import { a } from './alpha';\n");
}

#[tokio::test]
async fn test_analyze_impact_reports_dependents() {
    let workspace = fixture();
    let context = context(&workspace);
    let registry = ToolRegistry::with_refactoring_tools();
    let before = workspace.fingerprint();

    let response = registry
        .handle_tool(
            ToolCall::new(
                "analyze_impact",
                json!({
                    "tool": "move",
                    "arguments": { "source": "src/a.ts", "destination": "lib/a.ts" }
                }),
            ),
            &context,
        )
        .await
        .unwrap();
    let impact = &response["content"]["impact"];
    assert_eq!(impact["risk"], "low");
    assert!(impact["dependentFiles"].as_array().is_some_and(|d| !d.is_empty()));
    assert_eq!(workspace.fingerprint(), before);
    assert_eq!(context.engine.pending_plans(), 0);
}

#[tokio::test]
async fn test_ambiguous_rename_returns_candidates() {
    let workspace = TestWorkspace::new();
    let mut intelligence = FakeCodeIntelligence::new();
    for file in ["src/date.ts", "src/money.ts"] {
        let path = workspace.create_file(file, "export function format(v: unknown) {}\n");
        let location = Location {
            path,
            range: EditLocation::on_line(0, 16, 6),
        };
        intelligence = intelligence.with_symbol(
            SymbolCandidate {
                name: "format".to_string(),
                kind: "function".to_string(),
                location: location.clone(),
                container: None,
            },
            vec![location],
        );
    }
    let engine = workspace.engine_with(create_test_config(), Arc::new(intelligence));
    let context = ToolHandlerContext::new(engine);
    let registry = ToolRegistry::with_refactoring_tools();

    let response = registry
        .handle_tool(
            ToolCall::new(
                "rename",
                json!({ "target": { "kind": "symbol", "name": "format" }, "newName": "formatValue" }),
            ),
            &context,
        )
        .await
        .unwrap();
    assert_eq!(response["content"]["status"], "needs_disambiguation");
    assert_eq!(response["content"]["candidates"].as_array().map(Vec::len), Some(2));
    assert_eq!(context.engine.pending_plans(), 0);
}

#[tokio::test]
async fn test_invalid_arguments_become_error_payload() {
    let workspace = fixture();
    let context = context(&workspace);
    let registry = ToolRegistry::with_refactoring_tools();

    let err = registry
        .handle_tool(ToolCall::new("move", json!({ "source": "src/a.ts" })), &context)
        .await
        .unwrap_err();
    assert!(matches!(err, RefitError::InvalidRequest { .. }));

    let payload = registry
        .dispatch(ToolCall::new("apply_plan", json!({ "planId": "not-a-uuid" })), &context)
        .await;
    assert_eq!(payload["error"]["kind"], "validation");
    assert_eq!(payload["error"]["retryable"], false);
}
