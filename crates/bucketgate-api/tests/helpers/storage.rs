//! In-memory signing client standing in for an S3 backend.

use async_trait::async_trait;
use bucketgate_core::models::ResolvedBucket;
use bucketgate_storage::{
    ClientFactory, CompletedPart, SigningClient, StorageError, StorageResult,
};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub key: String,
    pub upload_id: String,
    pub parts: Vec<CompletedPart>,
}

#[derive(Default)]
pub struct FakeStorage {
    pub builds: AtomicUsize,
    pub fail_put: AtomicBool,
    pub fail_complete: AtomicBool,
    next_upload: AtomicUsize,
    pub puts: Mutex<Vec<(String, usize)>>,
    pub parts: Mutex<Vec<(String, i32, usize)>>,
    pub completions: Mutex<Vec<Completion>>,
}

impl FakeStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn completions(&self) -> Vec<Completion> {
        self.completions.lock().unwrap().clone()
    }
}

/// Client bound to one bucket, sharing the fake backend's call log.
pub struct FakeClient {
    backend: Arc<FakeStorage>,
    bucket: String,
}

#[async_trait]
impl SigningClient for FakeClient {
    async fn put_object(
        &self,
        key: &str,
        _content_type: &str,
        data: Bytes,
    ) -> StorageResult<Option<String>> {
        if self.backend.fail_put.load(Ordering::SeqCst) {
            return Err(StorageError::UploadFailed("AccessDenied: denied".to_string()));
        }
        self.backend
            .puts
            .lock()
            .unwrap()
            .push((key.to_string(), data.len()));
        Ok(Some(format!("\"put-{}\"", data.len())))
    }

    async fn presign_put(
        &self,
        key: &str,
        _content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        Ok(format!(
            "https://fake.storage/{}/{}?X-Amz-Expires={}",
            self.bucket,
            key,
            expires_in.as_secs()
        ))
    }

    async fn create_multipart_upload(
        &self,
        _key: &str,
        _content_type: &str,
    ) -> StorageResult<String> {
        let n = self.backend.next_upload.fetch_add(1, Ordering::SeqCst);
        Ok(format!("upload-{}", n + 1))
    }

    async fn upload_part(
        &self,
        _key: &str,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> StorageResult<String> {
        self.backend
            .parts
            .lock()
            .unwrap()
            .push((upload_id.to_string(), part_number, data.len()));
        Ok(format!("\"etag-{}\"", part_number))
    }

    async fn presign_upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        expires_in: Duration,
    ) -> StorageResult<String> {
        Ok(format!(
            "https://fake.storage/{}/{}?uploadId={}&partNumber={}&X-Amz-Expires={}",
            self.bucket,
            key,
            upload_id,
            part_number,
            expires_in.as_secs()
        ))
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StorageResult<()> {
        if self.backend.fail_complete.load(Ordering::SeqCst) {
            return Err(StorageError::MultipartFailed(
                "InvalidPart: One or more of the specified parts could not be found".to_string(),
            ));
        }
        self.backend.completions.lock().unwrap().push(Completion {
            key: key.to_string(),
            upload_id: upload_id.to_string(),
            parts: parts.to_vec(),
        });
        Ok(())
    }
}

pub struct FakeClientFactory(pub Arc<FakeStorage>);

impl ClientFactory for FakeClientFactory {
    fn build(&self, bucket: &ResolvedBucket) -> StorageResult<Arc<dyn SigningClient>> {
        self.0.builds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeClient {
            backend: self.0.clone(),
            bucket: bucket.name.clone(),
        }))
    }
}
