use pretty_assertions::assert_eq;
use refit_foundation::{
    warning_codes, DeleteTarget, EditLocation, ErrorKind, ExtractKind, InlineKind, Location,
    PlanOutcome, Position, RefactorOperation, RefitError, RiskLevel, SymbolCandidate, SymbolTarget,
};
use refit_test_support::{
    create_test_config, mock_code_intelligence, plan_ready, FakeCodeIntelligence, TestWorkspace,
};
use std::sync::Arc;

fn rename_by_name(name: &str, file: Option<&str>, new_name: &str) -> RefactorOperation {
    RefactorOperation::RenameSymbol {
        target: SymbolTarget::Name {
            name: name.to_string(),
            file: file.map(Into::into),
        },
        new_name: new_name.to_string(),
    }
}

#[tokio::test]
async fn test_rename_symbol_across_twelve_files_is_high_risk() {
    let workspace = TestWorkspace::new();
    workspace.create_file(
        "src/user.ts",
        "export function getUserData(id: string) {\n  return { id };\n}\n",
    );
    for i in 1..=11 {
        workspace.create_file(
            &format!("src/consumers/c{}.ts", i),
            &format!(
                "import {{ getUserData }} from '../user';\n\nexport const v{} = getUserData('{}');\n",
                i, i
            ),
        );
    }
    let intelligence =
        FakeCodeIntelligence::new().index_workspace(workspace.path(), "getUserData", "function");
    let engine = workspace.engine_with(create_test_config(), Arc::new(intelligence));

    let plan = plan_ready(
        &engine,
        rename_by_name("getUserData", None, "fetchUserProfile"),
    )
    .await
    .unwrap();

    assert_eq!(plan.affected_files.len(), 12);
    assert_eq!(plan.impact.dependent_files.len(), 12);
    assert_eq!(plan.risk(), RiskLevel::High);
    assert_eq!(plan.estimated_change_count, 23);
    assert!(!plan.impact.recommendations.is_empty());

    let result = engine.apply(&plan).await.unwrap();
    assert!(result.success);
    assert_eq!(result.files_modified.len(), 12);
    for file in workspace.files().iter().filter(|f| f.ends_with(".ts")) {
        let content = workspace.read_file(file);
        assert!(!content.contains("getUserData"), "{} still uses the old name", file);
        assert!(content.contains("fetchUserProfile"));
    }
}

#[tokio::test]
async fn test_analyze_impact_matches_plan_risk() {
    let workspace = TestWorkspace::new();
    workspace.create_file("src/a.ts", "export const limit = 3;\n");
    workspace.create_file("src/b.ts", "import { limit } from './a';\nlimit;\n");
    let intelligence =
        FakeCodeIntelligence::new().index_workspace(workspace.path(), "limit", "constant");
    let engine = workspace.engine_with(create_test_config(), Arc::new(intelligence));

    let impact = engine
        .analyze_impact(rename_by_name("limit", None, "maxItems"))
        .await
        .unwrap();
    assert_eq!(impact.risk, RiskLevel::Low);
    assert_eq!(
        impact.dependent_files,
        vec![
            workspace.absolute_path("src/a.ts"),
            workspace.absolute_path("src/b.ts"),
        ]
    );
}

fn declaration(workspace: &TestWorkspace, file: &str) -> (SymbolCandidate, Vec<Location>) {
    let location = Location {
        path: workspace.absolute_path(file),
        range: EditLocation::on_line(0, 16, 6),
    };
    (
        SymbolCandidate {
            name: "format".to_string(),
            kind: "function".to_string(),
            location: location.clone(),
            container: None,
        },
        vec![location],
    )
}

#[tokio::test]
async fn test_ambiguous_symbol_needs_disambiguation() {
    let workspace = TestWorkspace::new();
    workspace.create_file(
        "src/date.ts",
        "export function format(d: Date) {\n  return d.toISOString();\n}\n",
    );
    workspace.create_file(
        "src/money.ts",
        "export function format(n: number) {\n  return n.toFixed(2);\n}\n",
    );
    let (date, date_refs) = declaration(&workspace, "src/date.ts");
    let (money, money_refs) = declaration(&workspace, "src/money.ts");
    let intelligence = FakeCodeIntelligence::new()
        .with_symbol(date, date_refs)
        .with_symbol(money, money_refs);
    let engine = workspace.engine_with(create_test_config(), Arc::new(intelligence));
    let before = workspace.fingerprint();

    let outcome = engine
        .plan(rename_by_name("format", None, "formatValue"))
        .await
        .unwrap();
    let PlanOutcome::NeedsDisambiguation { candidates } = outcome else {
        panic!("expected candidates");
    };
    let paths: Vec<_> = candidates.iter().map(|c| c.location.path.clone()).collect();
    assert_eq!(
        paths,
        vec![
            workspace.absolute_path("src/date.ts"),
            workspace.absolute_path("src/money.ts"),
        ]
    );
    assert_eq!(workspace.fingerprint(), before);

    let err = engine
        .analyze_impact(rename_by_name("format", None, "formatValue"))
        .await
        .unwrap_err();
    assert!(matches!(err, RefitError::InvalidRequest { .. }));

    let plan = plan_ready(
        &engine,
        rename_by_name("format", Some("src/money.ts"), "formatMoney"),
    )
    .await
    .unwrap();
    assert!(engine.apply(&plan).await.unwrap().success);
    assert_eq!(
        workspace.read_file("src/money.ts"),
        "export function formatMoney(n: number) {\n  return n.toFixed(2);\n}\n"
    );
    assert_eq!(
        workspace.read_file("src/date.ts"),
        "export function format(d: Date) {\n  return d.toISOString();\n}\n"
    );
}

#[tokio::test]
async fn test_code_intelligence_timeout_is_unavailable() {
    let workspace = TestWorkspace::new();
    workspace.create_file("src/a.ts", "export function helper() {}\n");
    let mut intelligence = mock_code_intelligence();
    intelligence
        .expect_find_symbols()
        .returning(|_| Err(RefitError::timeout("workspace/symbol", Some(30_000))));
    let engine = workspace.engine_with(create_test_config(), Arc::new(intelligence));

    let err = engine
        .plan(rename_by_name("helper", None, "assist"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_restart_reaches_code_intelligence() {
    let workspace = TestWorkspace::new();
    let intelligence = Arc::new(FakeCodeIntelligence::new());
    let engine = workspace.engine_with(create_test_config(), intelligence.clone());

    engine
        .restart_code_intelligence(Some(vec!["ts".to_string()]))
        .await
        .unwrap();
    assert_eq!(intelligence.restart_count(), 1);
}

#[tokio::test]
async fn test_extract_variable_through_engine() {
    let workspace = TestWorkspace::new();
    let file = workspace.create_file("src/calc.ts", "const v = 1 + 2;\n");
    let engine = workspace.engine();

    let plan = plan_ready(
        &engine,
        RefactorOperation::Extract {
            extract: ExtractKind::Variable,
            file: "src/calc.ts".into(),
            range: EditLocation::on_line(0, 10, 5),
            name: "sum".to_string(),
        },
    )
    .await
    .unwrap();
    assert_eq!(plan.affected_files, vec![file]);

    assert!(engine.apply(&plan).await.unwrap().success);
    assert_eq!(
        workspace.read_file("src/calc.ts"),
        "const sum = 1 + 2;\nconst v = sum;\n"
    );
}

#[tokio::test]
async fn test_extract_rejects_invalid_name() {
    let workspace = TestWorkspace::new();
    workspace.create_file("src/calc.ts", "const v = 1 + 2;\n");
    let engine = workspace.engine();

    let err = engine
        .plan(RefactorOperation::Extract {
            extract: ExtractKind::Variable,
            file: "src/calc.ts".into(),
            range: EditLocation::on_line(0, 10, 5),
            name: "1sum".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RefitError::InvalidRequest { .. }));
}

#[tokio::test]
async fn test_inline_variable_through_engine() {
    let workspace = TestWorkspace::new();
    workspace.create_file(
        "src/send.ts",
        "const name = user.name;\nsend({ name, id: 1 });\nlog(name);\n",
    );
    let engine = workspace.engine();

    let plan = plan_ready(
        &engine,
        RefactorOperation::Inline {
            inline: InlineKind::Variable,
            file: "src/send.ts".into(),
            position: Position::new(0, 6),
        },
    )
    .await
    .unwrap();
    assert!(engine.apply(&plan).await.unwrap().success);
    assert_eq!(
        workspace.read_file("src/send.ts"),
        "send({ name: user.name, id: 1 });\nlog(user.name);\n"
    );
}

#[tokio::test]
async fn test_inline_function_is_not_supported() {
    let workspace = TestWorkspace::new();
    workspace.create_file("src/f.ts", "function one() { return 1; }\none();\n");
    let engine = workspace.engine();

    let err = engine
        .plan(RefactorOperation::Inline {
            inline: InlineKind::Function,
            file: "src/f.ts".into(),
            position: Position::new(0, 9),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RefitError::NotSupported { .. }));
}

#[tokio::test]
async fn test_delete_symbol_without_code_intelligence_warns() {
    let workspace = TestWorkspace::new();
    workspace.create_file(
        "src/a.ts",
        "import { a } from './a';\n\n/**\n * Unused helper.\n */\nexport function unused(x) {\n  if (x) { return { x }; }\n}\n\nexport function kept() {}\n",
    );
    let engine = workspace.engine();

    let plan = plan_ready(
        &engine,
        RefactorOperation::Delete {
            delete: DeleteTarget::Symbol {
                file: "src/a.ts".into(),
                position: Position::new(5, 16),
            },
        },
    )
    .await
    .unwrap();
    assert!(plan.has_warning(warning_codes::DANGLING_REFERENCES));

    assert!(engine.apply(&plan).await.unwrap().success);
    assert_eq!(
        workspace.read_file("src/a.ts"),
        "import { a } from './a';\n\nexport function kept() {}\n"
    );
}
