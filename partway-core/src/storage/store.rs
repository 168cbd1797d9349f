//! Object store seam for multipart uploads
//!
//! The coordinator only ever talks to a store through [`ObjectStore`], so
//! the S3 client, the in-memory store and test doubles are interchangeable.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One in-flight multipart upload, as issued by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSession {
    /// Bucket holding the object
    pub bucket: String,
    /// Object key being assembled
    pub key: String,
    /// Opaque token correlating every part with the final commit
    pub upload_id: String,
    /// When the store may discard the upload
    pub expires_at: DateTime<Utc>,
}

/// A part the store has accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    /// 1-based part number
    pub part_number: u32,
    /// Content hash (ETag) returned by the store
    pub etag: String,
}

impl CompletedPart {
    /// Create a completed part record
    pub fn new(part_number: u32, etag: impl Into<String>) -> Self {
        Self {
            part_number,
            etag: etag.into(),
        }
    }
}

/// Multipart operations of a remote object store
///
/// Every method is a single fallible remote call; callers decide retry and
/// escalation.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open a multipart upload for `key`
    async fn create_upload(&self, key: &str, expires_at: DateTime<Utc>) -> Result<UploadSession>;

    /// Upload one part's bytes, returning its content hash
    async fn upload_part(
        &self,
        session: &UploadSession,
        part_number: u32,
        body: Bytes,
    ) -> Result<String>;

    /// Assemble the given parts, in the given order, returning the object location
    async fn complete_upload(
        &self,
        session: &UploadSession,
        parts: &[CompletedPart],
    ) -> Result<String>;

    /// Discard the upload and any parts already stored
    async fn abort_upload(&self, session: &UploadSession) -> Result<()>;
}
