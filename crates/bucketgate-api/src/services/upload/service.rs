//! Upload coordinator
//!
//! Drives the three upload protocols as explicit transitions over persisted
//! [`FileRecord`]s:
//!
//! - direct: one signed write through the server, then a terminal record
//! - presigned single-part: a presigned PUT, then a client-reported completion
//! - presigned multipart: initiate (pending record + cached session client), presign
//!   parts, then finalize the manifest and record the outcome
//!
//! Backend calls and the persistence that follows them run in a spawned task, so a
//! client that disconnects mid-request does not leave a half-applied transition.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bucketgate_core::constants::UPLOAD_KEY_PREFIX;
use bucketgate_core::models::{
    BucketConfig, CompleteMultipartRequest, CompleteMultipartResponse, CompleteRequest,
    CompleteResponse, DirectUploadResponse, FileRecord, FileStatus, FileTransition,
    InitiateMultipartRequest, InitiateMultipartResponse, PresignPartRequest,
    PresignPartResponse, PresignRequest, PresignResponse,
};
use bucketgate_core::{AppError, EncryptionService, IdGenerator, SnowflakeId};
use bucketgate_db::{BucketRepository, FileRepository};
use bucketgate_storage::{CachedClient, ClientFactory, CompletedPart, SigningClientCache};
use chrono::Utc;
use validator::Validate;

use super::types::{BucketSource, DirectUpload, PartUpload};

const MAX_KEY_LEN: usize = 1024;

struct Inner {
    ids: IdGenerator,
    cache: Arc<SigningClientCache>,
    factory: Arc<dyn ClientFactory>,
    encryption: EncryptionService,
    files: Arc<dyn FileRepository>,
    buckets: Arc<dyn BucketRepository>,
    presign_expiry: Duration,
}

#[derive(Clone)]
pub struct UploadCoordinator {
    inner: Arc<Inner>,
}

/// Run `work` on its own task and wait for it. Dropping the caller does not cancel it.
async fn run_detached<F, T>(work: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|e| AppError::Internal(format!("Upload task did not finish: {}", e)))?
}

fn storage_key(file_name: &str) -> String {
    format!(
        "{}/{}-{}",
        UPLOAD_KEY_PREFIX,
        Utc::now().timestamp_millis(),
        file_name
    )
}

fn validate_key(key: &str) -> Result<(), AppError> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(AppError::InvalidInput(format!(
            "Key must be between 1 and {} characters",
            MAX_KEY_LEN
        )));
    }
    Ok(())
}

/// Cache key of a multipart session. Sessions are scoped to the bucket that opened them,
/// so one bucket can never evict or shadow another bucket's session.
fn session_key(bucket_id: i64, upload_id: &str) -> String {
    format!("{}:{}", bucket_id, upload_id)
}

/// Records of another bucket are reported as missing.
fn ensure_owned(record: &FileRecord, bucket_id: i64) -> Result<(), AppError> {
    if record.bucket_id != bucket_id {
        return Err(AppError::NotFound(format!("File {} not found", record.id)));
    }
    Ok(())
}

fn direct_record(
    file_id: SnowflakeId,
    upload: &DirectUpload,
    size_bytes: i64,
    bucket: &BucketConfig,
    status: FileStatus,
) -> FileRecord {
    let now = Utc::now();
    FileRecord {
        id: file_id,
        key: upload.key.clone(),
        file_name: upload.file_name.clone(),
        size_bytes: Some(size_bytes),
        content_type: upload.content_type.clone(),
        bucket_id: bucket.id,
        bucket_name: bucket.name.clone(),
        status,
        completed_at: (status == FileStatus::Completed).then_some(now),
        created_at: now,
    }
}

impl UploadCoordinator {
    pub fn new(
        ids: IdGenerator,
        cache: Arc<SigningClientCache>,
        factory: Arc<dyn ClientFactory>,
        encryption: EncryptionService,
        files: Arc<dyn FileRepository>,
        buckets: Arc<dyn BucketRepository>,
        presign_expiry: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                ids,
                cache,
                factory,
                encryption,
                files,
                buckets,
                presign_expiry,
            }),
        }
    }

    async fn bucket_config(&self, source: &BucketSource) -> Result<BucketConfig, AppError> {
        match source {
            BucketSource::Registered(id) => self
                .inner
                .buckets
                .get(*id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Bucket {} not found", id))),
            BucketSource::Inline(config) => Ok(config.clone()),
        }
    }

    /// Decrypt the bucket credentials and build a fresh signing client.
    fn build_client(&self, config: &BucketConfig) -> Result<CachedClient, AppError> {
        let bucket = config.resolve(&self.inner.encryption)?;
        let client = self.inner.factory.build(&bucket)?;
        Ok(CachedClient {
            client,
            bucket: Arc::new(bucket),
        })
    }

    async fn load_client(&self, source: &BucketSource) -> Result<CachedClient, AppError> {
        let config = self.bucket_config(source).await?;
        self.build_client(&config)
    }

    /// Client for an open multipart session, loaded into the cache on a miss.
    async fn session_client(
        &self,
        upload_id: &str,
        source: &BucketSource,
    ) -> Result<CachedClient, AppError> {
        let cached = self
            .inner
            .cache
            .get_or_create(&session_key(source.bucket_id(), upload_id), || {
                self.load_client(source)
            })
            .await?;

        if cached.bucket.id != source.bucket_id() {
            return Err(AppError::NotFound(format!(
                "Upload {} not found",
                upload_id
            )));
        }
        Ok(cached)
    }

    /// Presign a single-part PUT. Nothing is persisted until `complete`.
    pub async fn presign(
        &self,
        bucket_id: i64,
        request: PresignRequest,
    ) -> Result<PresignResponse, AppError> {
        request.validate()?;
        let cached = self.load_client(&BucketSource::Registered(bucket_id)).await?;

        let file_id = self.inner.ids.next_id()?;
        let key = storage_key(&request.file_name);
        let upload_url = cached
            .client
            .presign_put(&key, &request.content_type, self.inner.presign_expiry)
            .await?;

        tracing::info!(
            file_id = %file_id,
            key = %key,
            bucket = %cached.bucket.name,
            "Presigned single-part upload"
        );

        Ok(PresignResponse {
            upload_url,
            file_id,
            final_url: cached.bucket.public_url(&key),
            key,
        })
    }

    /// Record a client-driven single-part upload as completed. The object itself is not
    /// checked; the reported metadata is trusted.
    pub async fn complete(
        &self,
        bucket_id: i64,
        request: CompleteRequest,
    ) -> Result<CompleteResponse, AppError> {
        request.validate()?;
        let bucket = self
            .bucket_config(&BucketSource::Registered(bucket_id))
            .await?;

        let now = Utc::now();
        let record = FileRecord {
            id: request.file_id,
            key: request.key,
            file_name: request.file_name,
            size_bytes: Some(request.size_bytes),
            content_type: request.content_type,
            bucket_id: bucket.id,
            bucket_name: bucket.name,
            status: FileStatus::Completed,
            completed_at: Some(now),
            created_at: now,
        };
        let file_id = record.id;
        let files = self.inner.files.clone();

        run_detached(async move {
            if files.insert(&record).await? {
                return Ok(());
            }

            let existing = files
                .get(record.id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("File {} not found", record.id)))?;
            ensure_owned(&existing, bucket_id)?;
            if existing.status.is_terminal() {
                return Err(AppError::InvalidState(format!(
                    "File {} is already {}",
                    existing.id, existing.status
                )));
            }
            if existing.key != record.key
                || existing.file_name != record.file_name
                || existing.content_type != record.content_type
            {
                return Err(AppError::InvalidInput(
                    "Request does not match the file being completed".to_string(),
                ));
            }
            files
                .transition(
                    record.id,
                    FileTransition::Complete {
                        size_bytes: record.size_bytes,
                        completed_at: now,
                    },
                )
                .await?;
            Ok::<_, AppError>(())
        })
        .await?;

        tracing::info!(file_id = %file_id, bucket_id, "Single-part upload completed");

        Ok(CompleteResponse { file_id })
    }

    /// Start a multipart upload: create it on the backend, persist a pending record and
    /// seed the client cache under the backend upload id.
    pub async fn initiate_multipart(
        &self,
        bucket_id: i64,
        request: InitiateMultipartRequest,
    ) -> Result<InitiateMultipartResponse, AppError> {
        request.validate()?;
        let cached = self.load_client(&BucketSource::Registered(bucket_id)).await?;

        let file_id = self.inner.ids.next_id()?;
        let key = storage_key(&request.file_name);
        let this = self.clone();
        let task_key = key.clone();

        let upload_id = run_detached(async move {
            let upload_id = cached
                .client
                .create_multipart_upload(&task_key, &request.content_type)
                .await?;

            let record = FileRecord {
                id: file_id,
                key: task_key,
                file_name: request.file_name,
                size_bytes: None,
                content_type: request.content_type,
                bucket_id: cached.bucket.id,
                bucket_name: cached.bucket.name.clone(),
                status: FileStatus::Pending,
                completed_at: None,
                created_at: Utc::now(),
            };
            let inserted = match this.inner.files.insert(&record).await {
                Ok(inserted) => inserted,
                Err(err) => {
                    tracing::error!(
                        error = %err,
                        file_id = %file_id,
                        key = %record.key,
                        upload_id = %upload_id,
                        "Failed to record multipart upload; backend upload left open"
                    );
                    return Err(err);
                }
            };
            if !inserted {
                tracing::error!(
                    file_id = %file_id,
                    key = %record.key,
                    upload_id = %upload_id,
                    "File id already in use; backend upload left open"
                );
                return Err(AppError::Internal(format!(
                    "File id {} is already in use",
                    file_id
                )));
            }

            this.inner
                .cache
                .insert(&session_key(cached.bucket.id, &upload_id), cached)
                .await;
            Ok::<_, AppError>(upload_id)
        })
        .await?;

        tracing::info!(
            file_id = %file_id,
            key = %key,
            upload_id = %upload_id,
            "Multipart upload initiated"
        );

        Ok(InitiateMultipartResponse {
            file_id,
            key,
            upload_id,
        })
    }

    /// Presign one part. Part numbers are passed to the backend unchecked.
    pub async fn presign_part(
        &self,
        bucket_id: i64,
        request: PresignPartRequest,
    ) -> Result<PresignPartResponse, AppError> {
        request.validate()?;
        let cached = self
            .session_client(&request.upload_id, &BucketSource::Registered(bucket_id))
            .await?;

        let upload_url = cached
            .client
            .presign_upload_part(
                &request.key,
                &request.upload_id,
                request.part_number,
                self.inner.presign_expiry,
            )
            .await?;

        tracing::debug!(
            key = %request.key,
            upload_id = %request.upload_id,
            part_number = request.part_number,
            "Presigned multipart part"
        );

        Ok(PresignPartResponse { upload_url })
    }

    /// Finalize a multipart upload with the caller's manifest, in caller order.
    ///
    /// The backend outcome decides the terminal status. The cached session client is
    /// evicted whichever way it goes.
    pub async fn complete_multipart(
        &self,
        bucket_id: i64,
        request: CompleteMultipartRequest,
    ) -> Result<CompleteMultipartResponse, AppError> {
        request.validate()?;
        if request.parts.is_empty() {
            return Err(AppError::InvalidInput(
                "At least one part is required to complete a multipart upload".to_string(),
            ));
        }

        let record = self
            .inner
            .files
            .get(request.file_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", request.file_id)))?;
        ensure_owned(&record, bucket_id)?;
        if record.status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "File {} is already {}",
                record.id, record.status
            )));
        }
        if record.key != request.key {
            return Err(AppError::InvalidInput(
                "Key does not match the file being completed".to_string(),
            ));
        }

        let cached = self
            .session_client(&request.upload_id, &BucketSource::Registered(bucket_id))
            .await?;
        let manifest: Vec<CompletedPart> = request
            .parts
            .iter()
            .map(|part| CompletedPart {
                part_number: part.part_number,
                etag: part.etag.clone(),
            })
            .collect();
        let this = self.clone();

        run_detached(async move {
            let outcome = cached
                .client
                .complete_multipart_upload(&record.key, &request.upload_id, &manifest)
                .await;
            this.inner
                .cache
                .evict(&session_key(bucket_id, &request.upload_id))
                .await;

            if let Err(err) = outcome {
                if let Err(persist_err) = this
                    .inner
                    .files
                    .transition(record.id, FileTransition::Fail)
                    .await
                {
                    tracing::error!(
                        error = %persist_err,
                        file_id = %record.id,
                        upload_id = %request.upload_id,
                        "Failed to record failed multipart upload"
                    );
                }
                return Err(err.into());
            }

            this.inner
                .files
                .transition(
                    record.id,
                    FileTransition::Complete {
                        size_bytes: Some(request.size_bytes),
                        completed_at: Utc::now(),
                    },
                )
                .await?;

            tracing::info!(
                file_id = %record.id,
                key = %record.key,
                upload_id = %request.upload_id,
                part_count = manifest.len(),
                size_bytes = request.size_bytes,
                "Multipart upload completed"
            );

            Ok::<_, AppError>(CompleteMultipartResponse {
                final_url: cached.bucket.public_url(&record.key),
            })
        })
        .await
    }

    /// Proxy one multipart part through the server. No record is written.
    pub async fn upload_part(
        &self,
        source: BucketSource,
        part: PartUpload,
    ) -> Result<DirectUploadResponse, AppError> {
        validate_key(&part.key)?;

        let cached = self.session_client(&part.upload_id, &source).await?;
        let etag = run_detached(async move {
            let etag = cached
                .client
                .upload_part(&part.key, &part.upload_id, part.part_number, part.data)
                .await?;
            Ok::<_, AppError>(etag)
        })
        .await?;

        Ok(DirectUploadResponse {
            success: true,
            etag: Some(etag),
            file_id: None,
            cdn_url: None,
        })
    }

    /// Write a whole object through the server and record the outcome.
    pub async fn direct_upload(
        &self,
        source: BucketSource,
        upload: DirectUpload,
    ) -> Result<DirectUploadResponse, AppError> {
        validate_key(&upload.key)?;
        let config = self.bucket_config(&source).await?;
        let file_id = self.inner.ids.next_id()?;
        let size_bytes = i64::try_from(upload.data.len())
            .map_err(|_| AppError::InvalidInput("Upload is too large".to_string()))?;

        let cached = match self.build_client(&config) {
            Ok(cached) => cached,
            Err(err) => {
                let record =
                    direct_record(file_id, &upload, size_bytes, &config, FileStatus::Failed);
                if let Err(persist_err) = self.inner.files.insert(&record).await {
                    tracing::error!(
                        error = %persist_err,
                        file_id = %file_id,
                        "Failed to record failed upload"
                    );
                }
                return Err(err);
            }
        };

        let files = self.inner.files.clone();
        run_detached(async move {
            let outcome = cached
                .client
                .put_object(&upload.key, &upload.content_type, upload.data.clone())
                .await;

            match outcome {
                Ok(etag) => {
                    let record = direct_record(
                        file_id,
                        &upload,
                        size_bytes,
                        &config,
                        FileStatus::Completed,
                    );
                    files.insert(&record).await?;
                    tracing::info!(
                        file_id = %file_id,
                        key = %upload.key,
                        size_bytes,
                        "Direct upload completed"
                    );
                    Ok::<_, AppError>(DirectUploadResponse {
                        success: true,
                        etag,
                        file_id: Some(file_id),
                        cdn_url: Some(cached.bucket.public_url(&upload.key)),
                    })
                }
                Err(err) => {
                    let record =
                        direct_record(file_id, &upload, size_bytes, &config, FileStatus::Failed);
                    if let Err(persist_err) = files.insert(&record).await {
                        tracing::error!(
                            error = %persist_err,
                            file_id = %file_id,
                            key = %upload.key,
                            "Failed to record failed upload"
                        );
                    }
                    Err(err.into())
                }
            }
        })
        .await
    }

    /// Drop the cached client of one of `bucket_id`'s multipart sessions. Releasing an
    /// unknown session, or another bucket's, is a no-op.
    pub async fn release(&self, bucket_id: i64, upload_id: &str) -> bool {
        self.inner
            .cache
            .evict(&session_key(bucket_id, upload_id))
            .await
    }
}
