pub mod service;
pub mod types;

pub use service::UploadCoordinator;
pub use types::{BucketSource, DirectUpload, PartUpload};
