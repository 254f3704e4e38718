use crate::{S3SigningClient, SigningClient, StorageResult};
use bucketgate_core::models::ResolvedBucket;
use std::sync::Arc;

/// Builds a signing client from decrypted bucket credentials
pub trait ClientFactory: Send + Sync {
    fn build(&self, bucket: &ResolvedBucket) -> StorageResult<Arc<dyn SigningClient>>;
}

/// Factory for S3-compatible backends
#[derive(Debug, Default, Clone, Copy)]
pub struct S3ClientFactory;

impl ClientFactory for S3ClientFactory {
    fn build(&self, bucket: &ResolvedBucket) -> StorageResult<Arc<dyn SigningClient>> {
        let client = S3SigningClient::new(bucket)?;
        Ok(Arc::new(client))
    }
}
