//! Error types for Partway
//!
//! Covers planning, per-part, session-level and notification failures,
//! plus the configuration and I/O errors of the surrounding process.

use thiserror::Error;

/// Primary error type for all Partway operations
#[derive(Debug, Clone, Error)]
pub enum UploadError {
    // ========== Planning Errors ==========

    /// Bad planning parameters (empty file, zero part size)
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    // ========== Part Errors ==========

    /// A part exhausted its attempts
    #[error("Part {part_number} failed after {attempts} attempts: {message}")]
    TransientPart {
        part_number: u32,
        attempts: u32,
        message: String,
    },

    // ========== Session Errors ==========

    /// The store refused to open a multipart upload
    #[error("Failed to create multipart upload for {key}: {message}")]
    SessionCreation { key: String, message: String },

    /// The store refused to discard a multipart upload
    #[error("Failed to abort multipart upload {upload_id}: {message}")]
    Abort { upload_id: String, message: String },

    /// The store refused to assemble the uploaded parts
    #[error("Failed to complete multipart upload {upload_id}: {message}")]
    Complete { upload_id: String, message: String },

    // ========== Remote Errors ==========

    /// A store call failed before it was classified by the caller
    #[error("Storage operation failed: {message}")]
    Storage { message: String },

    /// Publishing a notification failed
    #[error("Notification failed: {message}")]
    Notification { message: String },

    // ========== Process Errors ==========

    /// Reading the local source file failed
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    /// A configuration value is missing or malformed
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl UploadError {
    /// Returns true if this error must terminate the process
    ///
    /// Nothing at this layer can clean up after these; the remote session
    /// is either missing or orphaned.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            UploadError::InvalidInput { .. }
                | UploadError::SessionCreation { .. }
                | UploadError::Abort { .. }
                | UploadError::Io { .. }
                | UploadError::Config { .. }
        )
    }
}

/// Result type alias for Partway operations
pub type Result<T> = std::result::Result<T, UploadError>;
