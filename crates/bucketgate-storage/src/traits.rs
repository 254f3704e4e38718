//! Signing client abstraction
//!
//! A `SigningClient` is bound to one bucket and one set of credentials. It issues the
//! signed calls the upload protocols need and produces presigned URLs for the calls
//! clients make themselves.

use async_trait::async_trait;
use bucketgate_core::AppError;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Multipart operation failed: {0}")]
    MultipartFailed(String),

    #[error("Presign failed: {0}")]
    PresignFailed(String),

    #[error("Unexpected backend response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConfigError(msg) => AppError::Configuration(msg),
            other => AppError::UpstreamStorage(other.to_string()),
        }
    }
}

/// One `{partNumber, ETag}` entry of a multipart manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: String,
}

#[async_trait]
pub trait SigningClient: Send + Sync {
    /// Single signed write of a whole object. Returns the object's ETag when the backend
    /// reports one.
    async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        data: Bytes,
    ) -> StorageResult<Option<String>>;

    /// Time-bounded URL for a client-side PUT of a whole object
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Start a multipart upload and return the backend-assigned upload id
    async fn create_multipart_upload(&self, key: &str, content_type: &str)
        -> StorageResult<String>;

    /// Upload one part through the server. Returns the part's ETag.
    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> StorageResult<String>;

    /// Time-bounded URL for a client-side PUT of one part
    async fn presign_upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Submit the part manifest, in the given order, to finalize the object
    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StorageResult<()>;
}
