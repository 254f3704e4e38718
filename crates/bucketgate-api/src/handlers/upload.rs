//! `POST /upload`: bytes sent through the server.
//!
//! With an `uploadId` field the chunk is proxied as one part of that multipart upload.
//! Without it the chunk is a whole object written under `key`.

use crate::auth::BucketContext;
use crate::error::HttpAppError;
use crate::services::upload::{BucketSource, DirectUpload, PartUpload};
use crate::state::AppState;
use axum::{
    extract::{Multipart, State},
    response::IntoResponse,
    Json,
};
use bucketgate_core::constants::DEFAULT_CONTENT_TYPE;
use bucketgate_core::models::BucketConfig;
use bucketgate_core::AppError;
use bytes::Bytes;
use std::sync::Arc;

#[derive(Debug, Default)]
struct UploadForm {
    upload_id: Option<String>,
    key: Option<String>,
    part_number: Option<String>,
    file_name: Option<String>,
    content_type: Option<String>,
    config: Option<String>,
    chunk: Option<Bytes>,
    chunk_file_name: Option<String>,
    chunk_content_type: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Failed to read multipart: {}", e)))?
    {
        let name = field.name().map(str::to_string).unwrap_or_default();

        if name == "chunk" || name == "file" {
            if form.chunk.is_some() {
                return Err(AppError::InvalidInput(
                    "Multiple chunk fields are not allowed".to_string(),
                ));
            }
            form.chunk_file_name = field.file_name().map(str::to_string);
            form.chunk_content_type = field.content_type().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::InvalidInput(format!("Failed to read chunk data: {}", e)))?;
            form.chunk = Some(data);
            continue;
        }

        let slot = match name.as_str() {
            "uploadId" => &mut form.upload_id,
            "key" => &mut form.key,
            "partNumber" => &mut form.part_number,
            "fileName" => &mut form.file_name,
            "contentType" => &mut form.content_type,
            "config" => &mut form.config,
            _ => continue,
        };
        let value = field
            .text()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Failed to read field {}: {}", name, e)))?;
        *slot = Some(value).filter(|v| !v.trim().is_empty());
    }

    Ok(form)
}

/// Last path segment of a storage key.
fn file_name_from_key(key: &str) -> String {
    key.rsplit('/').next().unwrap_or(key).to_string()
}

#[tracing::instrument(
    skip(state, ctx, multipart),
    fields(bucket_id = ctx.bucket_id, operation = "upload")
)]
pub async fn upload(
    ctx: BucketContext,
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let form = read_form(multipart).await?;

    let source = match form.config.as_deref() {
        Some(token) => BucketSource::Inline(
            state
                .tokens
                .verify_or_decrypt::<BucketConfig>(token)
                .into_result()?,
        ),
        None => BucketSource::Registered(ctx.bucket_id),
    };

    let data = form
        .chunk
        .ok_or_else(|| AppError::InvalidInput("No chunk provided".to_string()))?;
    let key = form
        .key
        .ok_or_else(|| AppError::InvalidInput("Key is required".to_string()))?;

    let response = match form.upload_id {
        Some(upload_id) => {
            let part_number = form
                .part_number
                .ok_or_else(|| AppError::InvalidInput("Part number is required".to_string()))?
                .trim()
                .parse::<i32>()
                .map_err(|_| {
                    AppError::InvalidInput("Part number must be an integer".to_string())
                })?;

            tracing::debug!(
                key = %key,
                upload_id = %upload_id,
                part_number,
                size_bytes = data.len(),
                "Proxying multipart part"
            );

            state
                .uploads
                .upload_part(
                    source,
                    PartUpload {
                        key,
                        upload_id,
                        part_number,
                        data,
                    },
                )
                .await?
        }
        None => {
            let file_name = form
                .file_name
                .or(form.chunk_file_name)
                .unwrap_or_else(|| file_name_from_key(&key));
            let content_type = form
                .content_type
                .or(form.chunk_content_type)
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

            state
                .uploads
                .direct_upload(
                    source,
                    DirectUpload {
                        key,
                        file_name,
                        content_type,
                        data,
                    },
                )
                .await?
        }
    };

    Ok(Json(response))
}
