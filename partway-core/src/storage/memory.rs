//! In-process object store
//!
//! Keeps pending uploads and assembled objects in memory. ETags are the
//! CRC32C of the part body, quoted the way S3 quotes them.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::store::{CompletedPart, ObjectStore, UploadSession};
use crate::error::{Result, UploadError};

struct PendingUpload {
    key: String,
    parts: BTreeMap<u32, (String, Bytes)>,
}

#[derive(Default)]
struct State {
    pending: HashMap<String, PendingUpload>,
    objects: HashMap<String, Bytes>,
    aborted: Vec<String>,
}

/// Object store backed by process memory
pub struct InMemoryStore {
    bucket: String,
    state: Mutex<State>,
}

impl InMemoryStore {
    /// Create an empty store for `bucket`
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// ETag the store assigns to a part body
    pub fn etag_for(body: &[u8]) -> String {
        format!("\"{:08x}\"", crc32c::crc32c(body))
    }

    /// Assembled object under `key`, if an upload completed
    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.state.lock().objects.get(key).cloned()
    }

    /// Number of uploads neither completed nor aborted
    pub fn pending_uploads(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Upload ids that were aborted, in call order
    pub fn aborted_uploads(&self) -> Vec<String> {
        self.state.lock().aborted.clone()
    }

    fn location(&self, key: &str) -> String {
        format!("memory://{}/{}", self.bucket, key)
    }

    fn no_such_upload(upload_id: &str) -> UploadError {
        UploadError::Storage {
            message: format!("NoSuchUpload: {}", upload_id),
        }
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn create_upload(&self, key: &str, expires_at: DateTime<Utc>) -> Result<UploadSession> {
        let upload_id = uuid::Uuid::new_v4().to_string();
        self.state.lock().pending.insert(
            upload_id.clone(),
            PendingUpload {
                key: key.to_string(),
                parts: BTreeMap::new(),
            },
        );

        debug!("Created in-memory upload {} for {}", upload_id, key);
        Ok(UploadSession {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            upload_id,
            expires_at,
        })
    }

    async fn upload_part(
        &self,
        session: &UploadSession,
        part_number: u32,
        body: Bytes,
    ) -> Result<String> {
        let etag = Self::etag_for(&body);
        let mut state = self.state.lock();
        let upload = state
            .pending
            .get_mut(&session.upload_id)
            .ok_or_else(|| Self::no_such_upload(&session.upload_id))?;

        // Re-uploading a part number replaces the earlier body, as in S3
        upload.parts.insert(part_number, (etag.clone(), body));
        Ok(etag)
    }

    async fn complete_upload(
        &self,
        session: &UploadSession,
        parts: &[CompletedPart],
    ) -> Result<String> {
        let mut state = self.state.lock();
        let upload = state
            .pending
            .get(&session.upload_id)
            .ok_or_else(|| Self::no_such_upload(&session.upload_id))?;

        if parts.is_empty() {
            return Err(UploadError::Storage {
                message: "MalformedXML: no parts listed".into(),
            });
        }

        let mut assembled = BytesMut::new();
        let mut previous = 0u32;
        for part in parts {
            if part.part_number <= previous {
                return Err(UploadError::Storage {
                    message: format!("InvalidPartOrder: part {} after {}", part.part_number, previous),
                });
            }
            previous = part.part_number;

            match upload.parts.get(&part.part_number) {
                Some((etag, body)) if *etag == part.etag => assembled.extend_from_slice(body),
                _ => {
                    return Err(UploadError::Storage {
                        message: format!("InvalidPart: {}", part.part_number),
                    })
                }
            }
        }

        let key = upload.key.clone();
        state.pending.remove(&session.upload_id);
        state.objects.insert(key.clone(), assembled.freeze());

        Ok(self.location(&key))
    }

    async fn abort_upload(&self, session: &UploadSession) -> Result<()> {
        let mut state = self.state.lock();
        if state.pending.remove(&session.upload_id).is_none() {
            return Err(Self::no_such_upload(&session.upload_id));
        }
        state.aborted.push(session.upload_id.clone());
        Ok(())
    }
}
