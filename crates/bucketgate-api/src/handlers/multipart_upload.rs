use crate::auth::BucketContext;
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use bucketgate_core::models::{
    CompleteMultipartRequest, InitiateMultipartRequest, PresignPartRequest,
};
use std::sync::Arc;

/// Start a multipart upload
#[tracing::instrument(
    skip(state, ctx, request),
    fields(
        bucket_id = ctx.bucket_id,
        file_name = %request.file_name,
        operation = "multipart_initiate"
    )
)]
pub async fn initiate(
    ctx: BucketContext,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<InitiateMultipartRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let response = state
        .uploads
        .initiate_multipart(ctx.bucket_id, request)
        .await?;
    Ok(Json(response))
}

/// Presign one part of a multipart upload
#[tracing::instrument(
    skip(state, ctx, request),
    fields(
        bucket_id = ctx.bucket_id,
        upload_id = %request.upload_id,
        part_number = request.part_number,
        operation = "multipart_presign"
    )
)]
pub async fn presign_part(
    ctx: BucketContext,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<PresignPartRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let response = state.uploads.presign_part(ctx.bucket_id, request).await?;
    Ok(Json(response))
}

/// Finalize a multipart upload
#[tracing::instrument(
    skip(state, ctx, request),
    fields(
        bucket_id = ctx.bucket_id,
        file_id = %request.file_id,
        upload_id = %request.upload_id,
        part_count = request.parts.len(),
        operation = "multipart_complete"
    )
)]
pub async fn complete(
    ctx: BucketContext,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CompleteMultipartRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let response = state
        .uploads
        .complete_multipart(ctx.bucket_id, request)
        .await?;
    Ok(Json(response))
}
