//! Shared test doubles for upload integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use partway_core::error::{Result, UploadError};
use partway_core::notify::{NotificationClient, Notifier};
use partway_core::storage::{CompletedPart, InMemoryStore, ObjectStore, UploadSession};
use partway_core::upload::{CoordinatorConfig, RetryPolicy, UploadCoordinator};

/// Fails every attempt
pub const ALWAYS: u32 = u32::MAX;

/// Calls observed by a [`ScriptedStore`]
#[derive(Debug, Default, Clone)]
pub struct CallLog {
    pub creates: u32,
    pub uploads: HashMap<u32, u32>,
    pub completes: Vec<Vec<CompletedPart>>,
    pub aborts: Vec<String>,
}

/// In-memory store with scripted failures and delays
pub struct ScriptedStore {
    inner: InMemoryStore,
    part_failures: HashMap<u32, u32>,
    part_delays: HashMap<u32, Duration>,
    panic_part: Option<u32>,
    fail_create: bool,
    fail_complete: bool,
    fail_abort: bool,
    log: Mutex<CallLog>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryStore::new("test-bucket"),
            part_failures: HashMap::new(),
            part_delays: HashMap::new(),
            panic_part: None,
            fail_create: false,
            fail_complete: false,
            fail_abort: false,
            log: Mutex::new(CallLog::default()),
        }
    }

    /// Fail the first `times` attempts of `part_number`
    pub fn fail_part(mut self, part_number: u32, times: u32) -> Self {
        self.part_failures.insert(part_number, times);
        self
    }

    /// Delay every attempt of `part_number`
    pub fn delay_part(mut self, part_number: u32, delay: Duration) -> Self {
        self.part_delays.insert(part_number, delay);
        self
    }

    /// Panic inside the upload of `part_number`
    pub fn panic_on_part(mut self, part_number: u32) -> Self {
        self.panic_part = Some(part_number);
        self
    }

    pub fn fail_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn fail_complete(mut self) -> Self {
        self.fail_complete = true;
        self
    }

    pub fn fail_abort(mut self) -> Self {
        self.fail_abort = true;
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.lock().clone()
    }

    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.inner.object(key)
    }
}

#[async_trait]
impl ObjectStore for ScriptedStore {
    async fn create_upload(&self, key: &str, expires_at: DateTime<Utc>) -> Result<UploadSession> {
        self.log.lock().creates += 1;
        if self.fail_create {
            return Err(UploadError::Storage {
                message: "AccessDenied".into(),
            });
        }
        self.inner.create_upload(key, expires_at).await
    }

    async fn upload_part(
        &self,
        session: &UploadSession,
        part_number: u32,
        body: Bytes,
    ) -> Result<String> {
        let attempt = {
            let mut log = self.log.lock();
            let count = log.uploads.entry(part_number).or_insert(0);
            *count += 1;
            *count
        };

        if let Some(delay) = self.part_delays.get(&part_number) {
            tokio::time::sleep(*delay).await;
        }
        if self.panic_part == Some(part_number) {
            panic!("scripted panic in part {}", part_number);
        }
        let failures = self.part_failures.get(&part_number).copied().unwrap_or(0);
        if attempt <= failures {
            return Err(UploadError::Storage {
                message: format!("503 SlowDown on part {} attempt {}", part_number, attempt),
            });
        }

        self.inner.upload_part(session, part_number, body).await
    }

    async fn complete_upload(
        &self,
        session: &UploadSession,
        parts: &[CompletedPart],
    ) -> Result<String> {
        self.log.lock().completes.push(parts.to_vec());
        if self.fail_complete {
            return Err(UploadError::Storage {
                message: "InvalidPart".into(),
            });
        }
        self.inner.complete_upload(session, parts).await
    }

    async fn abort_upload(&self, session: &UploadSession) -> Result<()> {
        self.log.lock().aborts.push(session.upload_id.clone());
        if self.fail_abort {
            return Err(UploadError::Storage {
                message: "InternalError".into(),
            });
        }
        self.inner.abort_upload(session).await
    }
}

/// Records every published notification
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl NotificationClient for RecordingNotifier {
    async fn publish(&self, subject: &str, message: &str) -> Result<()> {
        self.sent.lock().push((subject.to_string(), message.to_string()));
        Ok(())
    }
}

/// Deterministic source bytes
pub fn source(len: usize) -> Bytes {
    (0..len).map(|i| (i * 31 % 256) as u8).collect::<Vec<_>>().into()
}

/// Coordinator over the scripted store with the given part size
pub fn coordinator(
    store: Arc<ScriptedStore>,
    notifier: Arc<RecordingNotifier>,
    part_size: u64,
) -> UploadCoordinator {
    let mut config = CoordinatorConfig::new("TestVideo");
    config.part_size = part_size;
    config.retry = RetryPolicy::new(2, Duration::from_secs(15));
    UploadCoordinator::new(store, Notifier::new(notifier), config)
}
