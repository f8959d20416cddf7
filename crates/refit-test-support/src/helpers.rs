//! Test helper functions and utilities

use anyhow::{anyhow, Result};
use refit_config::AppConfig;
use refit_foundation::{Plan, PlanOutcome, RefactorOperation};
use refit_plugin_api::PluginRegistry;
use refit_services::RefactorEngine;
use std::sync::Arc;

/// Create a test configuration for testing
pub fn create_test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.logging.level = "debug".to_string();
    // Short waits keep contention tests fast
    config.refactor.lock_timeout_ms = 500;
    config.cache.enabled = false;
    config
}

/// Registry with the bundled TypeScript and Markdown plugins.
pub fn default_registry() -> PluginRegistry {
    PluginRegistry::new()
        .with_plugin(Arc::new(refit_lang_typescript::TypeScriptPlugin::new()))
        .with_plugin(Arc::new(refit_lang_markdown::MarkdownPlugin::new()))
}

/// Build a plan, failing when the operation needs disambiguation.
pub async fn plan_ready(engine: &RefactorEngine, operation: RefactorOperation) -> Result<Plan> {
    match engine.plan(operation).await? {
        PlanOutcome::Ready { plan } => Ok(*plan),
        PlanOutcome::NeedsDisambiguation { candidates } => Err(anyhow!(
            "expected a plan, got {} candidates",
            candidates.len()
        )),
    }
}
