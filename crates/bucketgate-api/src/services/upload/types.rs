//! Types used by the upload coordinator

use bucketgate_core::models::BucketConfig;
use bytes::Bytes;

/// Where the target bucket of a request comes from
#[derive(Debug, Clone)]
pub enum BucketSource {
    /// A row in `s3_buckets`, named by the access token's claims
    Registered(i64),
    /// A bucket config carried inline in a transport token, secrets still field-sealed
    Inline(BucketConfig),
}

impl BucketSource {
    pub fn bucket_id(&self) -> i64 {
        match self {
            BucketSource::Registered(id) => *id,
            BucketSource::Inline(config) => config.id,
        }
    }
}

/// A whole object sent through the server in one request
#[derive(Debug, Clone)]
pub struct DirectUpload {
    pub key: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// One part of a multipart upload proxied through the server
#[derive(Debug, Clone)]
pub struct PartUpload {
    pub key: String,
    pub upload_id: String,
    pub part_number: i32,
    pub data: Bytes,
}
