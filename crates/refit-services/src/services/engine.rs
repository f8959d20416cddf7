//! Long-lived refactoring service
//!
//! [`RefactorEngine`] owns every component of the plan/apply pipeline and is
//! shared by `Arc` between tool handlers. Planning and preview never write.
//! Applying goes through the atomic applier, and a plan id is accepted once.

use super::atomic_applier::AtomicApplier;
use super::cancellation::CancellationFlag;
use super::edit_merger::EditMerger;
use super::lock_manager::LockManager;
use super::plan_store::PlanStore;
use super::planning::PlanBuilder;
use super::post_apply_validator::PostApplyValidator;
use super::reference_updater::{CacheStats, ReferenceUpdater};
use super::workspace_fs::{LocalFs, WorkspaceFs};
use refit_config::AppConfig;
use refit_foundation::{
    ApplyResult, ImpactAnalysis, Plan, PlanOutcome, Preview, RefactorOperation, RefitError,
    RefitResult,
};
use refit_lsp::CodeIntelligence;
use refit_plugin_api::PluginRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct RefactorEngine {
    config: AppConfig,
    project_root: PathBuf,
    fs: Arc<dyn WorkspaceFs>,
    intelligence: Arc<dyn CodeIntelligence>,
    references: Arc<ReferenceUpdater>,
    planner: PlanBuilder,
    applier: AtomicApplier,
    locks: Arc<LockManager>,
    plans: PlanStore,
}

impl RefactorEngine {
    /// Engine over the local filesystem.
    pub fn new(
        config: AppConfig,
        project_root: impl AsRef<Path>,
        registry: Arc<PluginRegistry>,
        intelligence: Arc<dyn CodeIntelligence>,
    ) -> RefitResult<Self> {
        Self::from_parts(
            config,
            project_root,
            registry,
            intelligence,
            Arc::new(LocalFs::new()),
        )
    }

    /// Engine over an arbitrary filesystem implementation.
    pub fn from_parts(
        config: AppConfig,
        project_root: impl AsRef<Path>,
        registry: Arc<PluginRegistry>,
        intelligence: Arc<dyn CodeIntelligence>,
        fs: Arc<dyn WorkspaceFs>,
    ) -> RefitResult<Self> {
        let project_root = project_root
            .as_ref()
            .canonicalize()
            .map_err(|e| RefitError::io_at(project_root.as_ref(), e))?;

        let references = Arc::new(ReferenceUpdater::new(
            &project_root,
            registry.clone(),
            fs.clone(),
            &config.refactor,
            config.cache.enabled,
        ));
        let planner = PlanBuilder::new(
            &project_root,
            fs.clone(),
            registry,
            references.clone(),
            intelligence.clone(),
        );

        let locks = Arc::new(LockManager::new());
        let mut applier = AtomicApplier::new(
            &project_root,
            fs.clone(),
            locks.clone(),
            references.cache().clone(),
            Duration::from_millis(config.refactor.lock_timeout_ms),
        );
        if config.validation.enabled {
            applier = applier.with_verification(Arc::new(PostApplyValidator::new(
                config.validation.clone(),
            )));
        }

        let plans = PlanStore::with_limits(
            Duration::from_secs(config.refactor.plan_ttl_seconds),
            config.refactor.max_stored_plans,
        );

        info!(
            project_root = %project_root.display(),
            validation = config.validation.enabled,
            cache = config.cache.enabled,
            "Refactor engine ready"
        );

        Ok(Self {
            config,
            project_root,
            fs,
            intelligence,
            references,
            planner,
            applier,
            locks,
            plans,
        })
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.locks
    }

    /// Build a plan, or the candidates a bare symbol name matched.
    #[instrument(skip(self, operation), fields(operation = operation.label()))]
    pub async fn plan(&self, operation: RefactorOperation) -> RefitResult<PlanOutcome> {
        self.planner.build(operation).await
    }

    /// Render the post-apply content of every file a plan touches.
    #[instrument(skip(self, plan), fields(plan_id = %plan.id))]
    pub async fn preview(&self, plan: &Plan) -> RefitResult<Preview> {
        EditMerger::preview(plan, self.fs.as_ref()).await
    }

    #[instrument(skip(self, operation), fields(operation = operation.label()))]
    pub async fn analyze_impact(&self, operation: RefactorOperation) -> RefitResult<ImpactAnalysis> {
        self.planner.analyze_impact(operation).await
    }

    /// Keep a plan for a later [`apply_stored`](Self::apply_stored).
    pub fn store_plan(&self, plan: Plan) -> Uuid {
        self.plans.insert(plan)
    }

    pub fn pending_plans(&self) -> usize {
        self.plans.pending_count()
    }

    pub async fn apply(&self, plan: &Plan) -> RefitResult<ApplyResult> {
        self.apply_with_cancellation(plan, &CancellationFlag::new())
            .await
    }

    #[instrument(skip(self, plan, cancel), fields(plan_id = %plan.id))]
    pub async fn apply_with_cancellation(
        &self,
        plan: &Plan,
        cancel: &CancellationFlag,
    ) -> RefitResult<ApplyResult> {
        if self.plans.is_consumed(plan.id) {
            return Err(RefitError::invalid_request(format!(
                "Plan {} has already been applied",
                plan.id
            )));
        }
        let result = self.applier.apply(plan, cancel).await?;
        self.plans.mark_consumed(plan.id);
        Ok(result)
    }

    /// Apply a plan previously kept with [`store_plan`](Self::store_plan).
    ///
    /// A plan rejected with a retryable error (such as `Busy`) stays pending.
    #[instrument(skip(self))]
    pub async fn apply_stored(&self, plan_id: Uuid) -> RefitResult<ApplyResult> {
        let plan = self.plans.take(plan_id)?;
        match self.applier.apply(&plan, &CancellationFlag::new()).await {
            Ok(result) => Ok(result),
            Err(e) if e.is_retryable() => {
                warn!(plan_id = %plan_id, error = %e, "Apply deferred, plan kept");
                self.plans.insert(plan);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Restart code intelligence for `extensions`, or every server.
    pub async fn restart_code_intelligence(&self, extensions: Option<Vec<String>>) -> RefitResult<()> {
        info!(extensions = ?extensions, "Restarting code intelligence");
        self.intelligence.restart(extensions).await
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.references.cache().stats().await
    }

    pub async fn shutdown(&self) -> RefitResult<()> {
        info!("Shutting down refactor engine");
        self.references.cache().clear().await;
        self.locks.cleanup_unused_locks().await;
        self.intelligence.shutdown().await
    }
}
