//! Local source loading

use bytes::Bytes;
use std::path::Path;
use tracing::debug;

use crate::error::{Result, UploadError};

/// Read the whole source file into an immutable buffer
///
/// Parts are cut from this buffer with zero-copy slices.
pub async fn read_source(path: &Path) -> Result<Bytes> {
    let data = tokio::fs::read(path).await.map_err(|e| UploadError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    debug!("Read {} bytes from {}", data.len(), path.display());
    Ok(Bytes::from(data))
}
