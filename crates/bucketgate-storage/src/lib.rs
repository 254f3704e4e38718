//! Bucketgate Storage Library
//!
//! Signing clients for S3-compatible buckets and the session-keyed cache that holds
//! them. A client is always built from a decrypted [`ResolvedBucket`]; the factory is
//! the only place that turns credentials into an SDK client.
//!
//! [`ResolvedBucket`]: bucketgate_core::models::ResolvedBucket

pub mod cache;
pub mod factory;
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use cache::{CachedClient, ClientCache, SigningClientCache};
pub use factory::{ClientFactory, S3ClientFactory};
pub use s3::S3SigningClient;
pub use traits::{CompletedPart, SigningClient, StorageError, StorageResult};
