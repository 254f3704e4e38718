use crate::traits::{CompletedPart, SigningClient, StorageError, StorageResult};
use async_trait::async_trait;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region, RequestChecksumCalculation};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart};
use aws_sdk_s3::Client;
use bucketgate_core::models::ResolvedBucket;
use bytes::Bytes;
use std::time::{Duration, Instant};

const CREDENTIALS_PROVIDER: &str = "bucketgate";

/// S3 signing client bound to one bucket's credentials
#[derive(Clone)]
pub struct S3SigningClient {
    client: Client,
    bucket: String,
}

impl S3SigningClient {
    /// Build a client for an S3-compatible endpoint (AWS, MinIO, R2, Spaces...).
    ///
    /// Path-style addressing is forced for compatibility with non-AWS providers. Retries
    /// are disabled: a failed backend call is surfaced to the caller as-is.
    pub fn new(bucket: &ResolvedBucket) -> StorageResult<Self> {
        if bucket.name.is_empty() {
            return Err(StorageError::ConfigError(
                "Bucket name must not be empty".to_string(),
            ));
        }

        let credentials = Credentials::new(
            bucket.access_key.clone(),
            bucket.secret_key.clone(),
            None,
            None,
            CREDENTIALS_PROVIDER,
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(bucket.region.clone()))
            .credentials_provider(credentials)
            .retry_config(RetryConfig::disabled())
            // Presigned URLs must not pin a checksum of an empty body
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .force_path_style(true);

        if !bucket.endpoint.is_empty() {
            builder = builder.endpoint_url(bucket.endpoint.clone());
        }

        tracing::debug!(
            bucket = %bucket.name,
            region = %bucket.region,
            endpoint = %bucket.endpoint,
            "S3 signing client created"
        );

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: bucket.name.clone(),
        })
    }

    fn presigning_config(expires_in: Duration) -> StorageResult<PresigningConfig> {
        PresigningConfig::expires_in(expires_in).map_err(|e| {
            StorageError::ConfigError(format!("Failed to create presigning config: {}", e))
        })
    }
}

/// Short diagnostic for the caller: the backend error code when there is one.
fn short_diagnostic<E, R>(err: &SdkError<E, R>) -> String
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err.as_service_error() {
        Some(service_err) => match (service_err.code(), service_err.message()) {
            (Some(code), Some(message)) => format!("{}: {}", code, message),
            (Some(code), None) => code.to_string(),
            _ => "service error".to_string(),
        },
        None => "request to storage backend failed".to_string(),
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[async_trait]
impl SigningClient for S3SigningClient {
    async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        data: Bytes,
    ) -> StorageResult<Option<String>> {
        let size = data.len();
        let start = Instant::now();

        let output = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = elapsed_ms(start),
                    "S3 upload failed"
                );
                StorageError::UploadFailed(short_diagnostic(&e))
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = elapsed_ms(start),
            "S3 upload successful"
        );

        Ok(output.e_tag().map(str::to_string))
    }

    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(Self::presigning_config(expires_in)?)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %key,
                    "Failed to presign S3 upload"
                );
                StorageError::PresignFailed(short_diagnostic(&e))
            })?;

        Ok(presigned.uri().to_string())
    }

    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: &str,
    ) -> StorageResult<String> {
        let start = Instant::now();

        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = elapsed_ms(start),
                    "S3 multipart initiate failed"
                );
                StorageError::MultipartFailed(short_diagnostic(&e))
            })?;

        let upload_id = output.upload_id().map(str::to_string).ok_or_else(|| {
            StorageError::InvalidResponse("Multipart initiate returned no upload id".to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            upload_id = %upload_id,
            duration_ms = elapsed_ms(start),
            "S3 multipart upload initiated"
        );

        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> StorageResult<String> {
        let size = data.len();
        let start = Instant::now();

        let output = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %key,
                    upload_id = %upload_id,
                    part_number,
                    size_bytes = size,
                    duration_ms = elapsed_ms(start),
                    "S3 part upload failed"
                );
                StorageError::UploadFailed(short_diagnostic(&e))
            })?;

        let etag = output.e_tag().map(str::to_string).ok_or_else(|| {
            StorageError::InvalidResponse("Part upload returned no ETag".to_string())
        })?;

        tracing::debug!(
            bucket = %self.bucket,
            key = %key,
            upload_id = %upload_id,
            part_number,
            size_bytes = size,
            duration_ms = elapsed_ms(start),
            "S3 part uploaded"
        );

        Ok(etag)
    }

    async fn presign_upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let presigned = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .presigned(Self::presigning_config(expires_in)?)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %key,
                    upload_id = %upload_id,
                    part_number,
                    "Failed to presign S3 part upload"
                );
                StorageError::PresignFailed(short_diagnostic(&e))
            })?;

        Ok(presigned.uri().to_string())
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StorageResult<()> {
        let start = Instant::now();

        let manifest: Vec<S3CompletedPart> = parts
            .iter()
            .map(|part| {
                S3CompletedPart::builder()
                    .part_number(part.part_number)
                    .e_tag(part.etag.clone())
                    .build()
            })
            .collect();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(manifest))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %key,
                    upload_id = %upload_id,
                    part_count = parts.len(),
                    duration_ms = elapsed_ms(start),
                    "S3 multipart complete failed"
                );
                StorageError::MultipartFailed(short_diagnostic(&e))
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            upload_id = %upload_id,
            part_count = parts.len(),
            duration_ms = elapsed_ms(start),
            "S3 multipart upload completed"
        );

        Ok(())
    }
}
