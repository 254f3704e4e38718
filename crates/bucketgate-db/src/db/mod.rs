//! Database repositories
//!
//! Each table has a trait describing the operations the upload engine needs and a
//! PostgreSQL implementation. In-memory implementations back the tests.

mod bucket;
mod file;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use bucket::{BucketRepository, NewBucket, PostgresBucketRepository};
pub use file::{FileRepository, PostgresFileRepository};
