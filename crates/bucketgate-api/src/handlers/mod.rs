pub mod cleanup;
pub mod health;
pub mod multipart_upload;
pub mod presigned_upload;
pub mod upload;
