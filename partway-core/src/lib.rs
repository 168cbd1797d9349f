//! Partway Core - concurrent multipart uploads to object storage
//!
//! This crate provides:
//! - Part planning over a fixed part size
//! - Concurrent part uploads with bounded, fixed-interval retry
//! - Commit-or-abort coordination of the whole upload
//! - Best-effort outcome notifications

pub mod config;
pub mod error;
pub mod notify;
pub mod source;
pub mod storage;
pub mod upload;

pub use config::UploadJobConfig;
pub use error::{Result, UploadError};
pub use notify::{NotificationClient, Notifier};
pub use storage::ObjectStore;
pub use upload::{Outcome, UploadCoordinator};
