//! Persistence layer for file records and bucket configurations.

pub mod db;

pub use db::{
    BucketRepository, FileRepository, NewBucket, PostgresBucketRepository,
    PostgresFileRepository,
};

#[cfg(any(test, feature = "test-utils"))]
pub use db::memory::{InMemoryBucketRepository, InMemoryFileRepository};
