//! Single-part uploads with bounded retry
//!
//! Each part runs as its own task and reports exactly one
//! [`PartUploadResult`] over the coordinator's result channel.

use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::planner::PartRange;
use super::retry::RetryPolicy;
use crate::error::UploadError;
use crate::storage::{CompletedPart, ObjectStore, UploadSession};

/// Terminal outcome of one part, after any retries
#[derive(Debug, Clone)]
pub enum PartUploadResult {
    /// The store accepted the part
    Success(CompletedPart),
    /// Every attempt failed; `error` is from the last one
    Failure { part_number: u32, error: UploadError },
}

impl PartUploadResult {
    /// Part number this result belongs to
    pub fn part_number(&self) -> u32 {
        match self {
            PartUploadResult::Success(part) => part.part_number,
            PartUploadResult::Failure { part_number, .. } => *part_number,
        }
    }

    /// Returns true for a successful part
    pub fn is_success(&self) -> bool {
        matches!(self, PartUploadResult::Success(_))
    }
}

/// Uploads parts of one session
#[derive(Clone)]
pub struct PartUploader {
    store: Arc<dyn ObjectStore>,
    session: Arc<UploadSession>,
    policy: RetryPolicy,
}

impl PartUploader {
    /// Create an uploader bound to `session`
    pub fn new(store: Arc<dyn ObjectStore>, session: Arc<UploadSession>, policy: RetryPolicy) -> Self {
        Self {
            store,
            session,
            policy,
        }
    }

    /// Upload one part, retrying with a fixed backoff
    ///
    /// Each attempt is exactly one remote call. Stops at the first success.
    pub async fn upload(&self, range: PartRange, body: Bytes) -> PartUploadResult {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 1;

        debug!("Uploading part {} ({} bytes)", range.part_number, body.len());

        loop {
            match self
                .store
                .upload_part(&self.session, range.part_number, body.clone())
                .await
            {
                Ok(etag) => {
                    return PartUploadResult::Success(CompletedPart::new(range.part_number, etag));
                }
                Err(e) => {
                    warn!(
                        "Attempt {}/{} for part {} failed: {}",
                        attempt, max_attempts, range.part_number, e
                    );

                    match self.policy.delay_after(attempt) {
                        Some(delay) => {
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                        }
                        None => {
                            return PartUploadResult::Failure {
                                part_number: range.part_number,
                                error: UploadError::TransientPart {
                                    part_number: range.part_number,
                                    attempts: attempt,
                                    message: e.to_string(),
                                },
                            };
                        }
                    }
                }
            }
        }
    }

    /// Run [`upload`](Self::upload) as a task that sends its result on `results`
    ///
    /// The sender is dropped when the task ends, so the receiver closes once
    /// every spawned part has finished.
    pub fn spawn(
        &self,
        range: PartRange,
        body: Bytes,
        results: mpsc::UnboundedSender<PartUploadResult>,
    ) -> JoinHandle<()> {
        let uploader = self.clone();
        tokio::spawn(async move {
            let result = uploader.upload(range, body).await;
            if results.send(result).is_err() {
                debug!("Result receiver dropped before part {} reported", range.part_number);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use chrono::Utc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let store = Arc::new(InMemoryStore::new("bucket"));
        let session = Arc::new(store.create_upload("obj", Utc::now()).await.unwrap());
        let uploader = PartUploader::new(store.clone(), session, RetryPolicy::new(2, Duration::ZERO));

        let body = Bytes::from_static(b"part-one");
        let range = PartRange { part_number: 1, offset: 0, length: 8 };
        let result = uploader.upload(range, body.clone()).await;

        match result {
            PartUploadResult::Success(part) => {
                assert_eq!(part.part_number, 1);
                assert_eq!(part.etag, InMemoryStore::etag_for(&body));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_session_exhausts_attempts() {
        let store = Arc::new(InMemoryStore::new("bucket"));
        let session = Arc::new(UploadSession {
            bucket: "bucket".into(),
            key: "obj".into(),
            upload_id: "missing".into(),
            expires_at: Utc::now(),
        });
        let uploader = PartUploader::new(store, session, RetryPolicy::default());

        let range = PartRange { part_number: 4, offset: 0, length: 1 };
        let result = uploader.upload(range, Bytes::from_static(b"x")).await;

        match result {
            PartUploadResult::Failure { part_number, error } => {
                assert_eq!(part_number, 4);
                assert!(matches!(error, UploadError::TransientPart { attempts: 3, .. }));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_spawn_reports_once_and_closes_channel() {
        let store = Arc::new(InMemoryStore::new("bucket"));
        let session = Arc::new(store.create_upload("obj", Utc::now()).await.unwrap());
        let uploader = PartUploader::new(store, session, RetryPolicy::default());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = uploader.spawn(
            PartRange { part_number: 1, offset: 0, length: 3 },
            Bytes::from_static(b"abc"),
            tx,
        );
        handle.await.unwrap();

        assert!(rx.recv().await.unwrap().is_success());
        assert!(rx.recv().await.is_none());
    }
}
