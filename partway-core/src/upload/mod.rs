//! Multipart upload orchestration
//!
//! Planning, per-part upload with retry, and the coordinator that commits
//! or aborts the whole upload.

pub mod coordinator;
pub mod part;
pub mod planner;
pub mod retry;

pub use coordinator::{
    AbortReason, CompletedPartSet, CoordinatorConfig, Outcome, UploadCoordinator, UploadState,
};
pub use part::{PartUploadResult, PartUploader};
pub use planner::{plan, PartRange};
pub use retry::RetryPolicy;
