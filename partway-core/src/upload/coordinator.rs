//! Upload coordinator
//!
//! Drives one multipart upload end to end: plan, open a session, fan out one
//! task per part, collect every result, then commit or abort and report the
//! outcome. No part is cancelled once started; a failure is only acted on
//! after all parts have finished.

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::part::{PartUploadResult, PartUploader};
use super::planner::{plan, PartRange};
use super::retry::RetryPolicy;
use crate::error::{Result, UploadError};
use crate::notify::Notifier;
use crate::storage::{CompletedPart, ObjectStore, UploadSession};

/// Default part size (50 MB)
pub const DEFAULT_PART_SIZE: u64 = 50_000_000;

/// Default session expiry
pub const DEFAULT_EXPIRY_HOURS: i64 = 24;

/// Configuration for one upload run
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Object key to create
    pub key: String,
    /// Bytes per part; the last part holds the remainder
    pub part_size: u64,
    /// Per-part retry policy
    pub retry: RetryPolicy,
    /// How long the store should keep the session
    pub expiry: chrono::Duration,
}

impl CoordinatorConfig {
    /// Config for `key` with default sizing and retry
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            part_size: DEFAULT_PART_SIZE,
            retry: RetryPolicy::default(),
            expiry: chrono::Duration::hours(DEFAULT_EXPIRY_HOURS),
        }
    }
}

/// Lifecycle of an upload run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    /// Session opened
    Created,
    /// Parts in flight
    Uploading,
    /// Commit issued
    Completing,
    /// Object assembled
    Completed,
    /// Abort issued
    Aborting,
    /// Upload discarded
    Aborted,
}

impl UploadState {
    /// Whether `next` is reachable from this state in one step
    pub fn can_transition_to(self, next: UploadState) -> bool {
        use UploadState::*;
        matches!(
            (self, next),
            (Created, Uploading)
                | (Uploading, Completing)
                | (Uploading, Aborting)
                | (Uploading, Aborted)
                | (Completing, Completed)
                | (Completing, Aborted)
                | (Aborting, Aborted)
        )
    }
}

/// Why a run did not produce an object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbortReason {
    /// A part exhausted its retries
    PartFailed { part_number: u32, error: String },
    /// The store rejected the commit
    CompleteFailed { error: String },
    /// Nothing was uploaded
    NoParts,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::PartFailed { error, .. } => write!(f, "{}", error),
            AbortReason::CompleteFailed { error } => write!(f, "{}", error),
            AbortReason::NoParts => write!(f, "no parts uploaded"),
        }
    }
}

/// Terminal state of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The object was committed
    Completed { location: String, parts: usize },
    /// The upload was abandoned
    Aborted { reason: AbortReason },
}

impl Outcome {
    /// Returns true if the object was committed
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed { .. })
    }

    /// Notification subject
    pub fn subject(&self) -> &'static str {
        match self {
            Outcome::Completed { .. } => "Upload Successful",
            Outcome::Aborted { .. } => "Upload Failed",
        }
    }

    /// Notification message
    pub fn message(&self) -> String {
        match self {
            Outcome::Completed { location, .. } => format!(
                "Multipart upload completed successfully. Location: {}",
                location
            ),
            Outcome::Aborted { reason } => match reason {
                AbortReason::PartFailed { error, .. } => format!("Error: {}", error),
                AbortReason::CompleteFailed { error } => {
                    format!("Error completing upload: {}", error)
                }
                AbortReason::NoParts => "No parts were successfully uploaded.".to_string(),
            },
        }
    }
}

/// Successful parts of a run, unique by part number
#[derive(Debug, Default)]
pub struct CompletedPartSet {
    parts: HashMap<u32, CompletedPart>,
}

impl CompletedPartSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a part; a part number may only be added once
    pub fn insert(&mut self, part: CompletedPart) -> Result<()> {
        if self.parts.contains_key(&part.part_number) {
            return Err(UploadError::Internal {
                message: format!("part {} reported more than once", part.part_number),
            });
        }
        self.parts.insert(part.part_number, part);
        Ok(())
    }

    /// Number of parts held
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns true if no part was added
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Parts in ascending part-number order, ready for commit
    pub fn into_sorted(self) -> Vec<CompletedPart> {
        let mut parts: Vec<CompletedPart> = self.parts.into_values().collect();
        parts.sort_by_key(|p| p.part_number);
        parts
    }
}

/// Orchestrates a single multipart upload
pub struct UploadCoordinator {
    store: Arc<dyn ObjectStore>,
    notifier: Notifier,
    config: CoordinatorConfig,
}

impl UploadCoordinator {
    /// Create a coordinator over the given store and notifier
    pub fn new(store: Arc<dyn ObjectStore>, notifier: Notifier, config: CoordinatorConfig) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Upload `data` and report the outcome
    ///
    /// Returns `Err` only for fatal errors (bad part size, session creation
    /// or abort failure); those are not notified. Every `Ok` outcome is
    /// notified exactly once.
    pub async fn run(&self, data: Bytes) -> Result<Outcome> {
        let outcome = self.execute(data).await?;

        match &outcome {
            Outcome::Completed { location, parts } => {
                info!("Upload of {} completed with {} parts at {}", self.config.key, parts, location)
            }
            Outcome::Aborted { reason } => {
                warn!("Upload of {} aborted: {}", self.config.key, reason)
            }
        }

        self.notifier.notify_outcome(&outcome).await;
        Ok(outcome)
    }

    async fn execute(&self, data: Bytes) -> Result<Outcome> {
        let ranges = match plan(data.len() as u64, self.config.part_size) {
            Ok(ranges) => ranges,
            Err(_) if data.is_empty() && self.config.part_size > 0 => {
                warn!("Source for {} is empty, nothing to upload", self.config.key);
                return Ok(Outcome::Aborted {
                    reason: AbortReason::NoParts,
                });
            }
            Err(e) => return Err(e),
        };

        let expires_at = Utc::now()
            .checked_add_signed(self.config.expiry)
            .ok_or_else(|| UploadError::InvalidInput {
                reason: format!("session expiry of {} is out of range", self.config.expiry),
            })?;
        let session = self
            .store
            .create_upload(&self.config.key, expires_at)
            .await
            .map_err(|e| UploadError::SessionCreation {
                key: self.config.key.clone(),
                message: e.to_string(),
            })?;
        let session = Arc::new(session);
        let mut state = UploadState::Created;

        info!(
            "Created upload {} for {} ({} bytes, {} parts)",
            session.upload_id,
            session.key,
            data.len(),
            ranges.len()
        );

        advance(&mut state, UploadState::Uploading);
        let results = self.upload_parts(session.clone(), &ranges, &data).await;

        let mut completed = CompletedPartSet::new();
        let mut first_failure: Option<(u32, UploadError)> = None;
        for result in results {
            match result {
                PartUploadResult::Success(part) => {
                    let part_number = part.part_number;
                    if let Err(e) = completed.insert(part) {
                        first_failure.get_or_insert((part_number, e));
                    }
                }
                PartUploadResult::Failure { part_number, error } => {
                    first_failure.get_or_insert((part_number, error));
                }
            }
        }

        if let Some((part_number, error)) = first_failure {
            advance(&mut state, UploadState::Aborting);
            warn!(
                "Part {} failed, aborting upload {} ({} successful parts discarded)",
                part_number,
                session.upload_id,
                completed.len()
            );

            self.store
                .abort_upload(&session)
                .await
                .map_err(|e| UploadError::Abort {
                    upload_id: session.upload_id.clone(),
                    message: e.to_string(),
                })?;
            advance(&mut state, UploadState::Aborted);

            return Ok(Outcome::Aborted {
                reason: AbortReason::PartFailed {
                    part_number,
                    error: error.to_string(),
                },
            });
        }

        if completed.is_empty() {
            advance(&mut state, UploadState::Aborted);
            return Ok(Outcome::Aborted {
                reason: AbortReason::NoParts,
            });
        }

        advance(&mut state, UploadState::Completing);
        let parts = completed.into_sorted();
        let count = parts.len();

        match self.store.complete_upload(&session, &parts).await {
            Ok(location) => {
                advance(&mut state, UploadState::Completed);
                Ok(Outcome::Completed {
                    location,
                    parts: count,
                })
            }
            Err(e) => {
                advance(&mut state, UploadState::Aborted);
                let error = UploadError::Complete {
                    upload_id: session.upload_id.clone(),
                    message: e.to_string(),
                };
                error!(
                    "{}; upload {} may be left incomplete in the store",
                    error, session.upload_id
                );
                Ok(Outcome::Aborted {
                    reason: AbortReason::CompleteFailed {
                        error: error.to_string(),
                    },
                })
            }
        }
    }

    /// Upload every range concurrently and return one result per range
    async fn upload_parts(
        &self,
        session: Arc<UploadSession>,
        ranges: &[PartRange],
        data: &Bytes,
    ) -> Vec<PartUploadResult> {
        let uploader = PartUploader::new(self.store.clone(), session, self.config.retry);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut handles = Vec::with_capacity(ranges.len());
        let mut remaining = data.len() as u64;
        for range in ranges {
            handles.push(uploader.spawn(*range, data.slice(range.as_range()), tx.clone()));
            remaining -= range.length;
            info!(
                "Upload of part {} started, {} bytes remaining",
                range.part_number, remaining
            );
        }
        // Only the tasks hold senders now; the channel closes when the last one ends
        drop(tx);

        let mut results = Vec::with_capacity(ranges.len());
        while let Some(result) = rx.recv().await {
            match &result {
                PartUploadResult::Success(part) => {
                    info!("Upload of part {} finished", part.part_number)
                }
                PartUploadResult::Failure { part_number, error } => {
                    warn!("Upload of part {} failed: {}", part_number, error)
                }
            }
            results.push(result);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Part upload task terminated abnormally: {}", e);
            }
        }

        // A task that died before reporting still owes a result
        let reported: HashSet<u32> = results.iter().map(|r| r.part_number()).collect();
        for range in ranges {
            if !reported.contains(&range.part_number) {
                results.push(PartUploadResult::Failure {
                    part_number: range.part_number,
                    error: UploadError::Internal {
                        message: format!("part {} ended without a result", range.part_number),
                    },
                });
            }
        }

        debug!("Collected {} part results", results.len());
        results
    }
}

fn advance(state: &mut UploadState, next: UploadState) {
    debug_assert!(
        state.can_transition_to(next),
        "illegal transition {:?} -> {:?}",
        state,
        next
    );
    debug!("Upload state {:?} -> {:?}", state, next);
    *state = next;
}
