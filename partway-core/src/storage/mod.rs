//! Object storage backends
//!
//! The [`ObjectStore`] trait is the only seam the upload coordinator sees;
//! S3 and in-memory implementations live behind it.

pub mod memory;
pub mod s3;
pub mod sigv4;
pub mod store;

pub use memory::InMemoryStore;
pub use s3::{S3Client, S3Config};
pub use sigv4::Credentials;
pub use store::{CompletedPart, ObjectStore, UploadSession};
