//! Test support utilities and fixtures for refit integration tests

pub mod harness;
pub mod helpers;
pub mod mocks;

// Re-export commonly used helpers
pub use harness::{BarrierFs, CancellingFs, FailingFs, FileFingerprint, TestWorkspace};
pub use helpers::{create_test_config, default_registry, plan_ready};
pub use mocks::{mock_code_intelligence, FakeCodeIntelligence, MockCodeIntelligence};
