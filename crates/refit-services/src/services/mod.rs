//! Services for planning and applying refactors

pub mod atomic_applier;
pub mod cancellation;
pub mod checksum_validator;
pub mod edit_merger;
pub mod engine;
pub mod file_discovery;
pub mod impact_analyzer;
pub mod lock_manager;
pub mod path_utils;
pub mod plan_store;
pub mod planning;
pub mod post_apply_validator;
pub mod reference_updater;
pub mod snapshot;
pub mod workspace_fs;

pub use atomic_applier::AtomicApplier;
pub use cancellation::CancellationFlag;
pub use checksum_validator::ChecksumValidator;
pub use edit_merger::EditMerger;
pub use engine::RefactorEngine;
pub use file_discovery::FileDiscovery;
pub use impact_analyzer::ImpactAnalyzer;
pub use lock_manager::{LockManager, LockSet};
pub use plan_store::PlanStore;
pub use planning::{is_valid_identifier, PlanBuilder};
pub use post_apply_validator::{PostApplyValidator, VerificationHook};
pub use reference_updater::{CacheStats, MoveContext, ReferenceEdits, ReferenceUpdater};
pub use snapshot::{SnapshotState, SnapshotStore};
pub use workspace_fs::{LocalFs, WorkspaceFs};
