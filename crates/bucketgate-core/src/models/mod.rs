//! Data models for the upload engine

mod bucket;
mod file;
mod upload;

pub use bucket::{BucketConfig, ResolvedBucket};
pub use file::{FileRecord, FileStatus, FileTransition};
pub use upload::*;
