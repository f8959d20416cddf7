//! Test harnesses for refactoring scenarios

pub mod failing_fs;
pub mod workspace;

pub use failing_fs::{BarrierFs, CancellingFs, FailingFs};
pub use workspace::{FileFingerprint, TestWorkspace};
