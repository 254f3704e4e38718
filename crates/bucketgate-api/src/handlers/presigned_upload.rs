use crate::auth::BucketContext;
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use bucketgate_core::models::{CompleteRequest, PresignRequest};
use std::sync::Arc;

/// Presign a single-part upload
#[tracing::instrument(
    skip(state, ctx, request),
    fields(
        bucket_id = ctx.bucket_id,
        file_name = %request.file_name,
        content_type = %request.content_type,
        operation = "presign"
    )
)]
pub async fn presign(
    ctx: BucketContext,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<PresignRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let response = state.uploads.presign(ctx.bucket_id, request).await?;
    Ok(Json(response))
}

/// Record a presigned single-part upload as completed
#[tracing::instrument(
    skip(state, ctx, request),
    fields(
        bucket_id = ctx.bucket_id,
        file_id = %request.file_id,
        key = %request.key,
        size_bytes = request.size_bytes,
        operation = "complete"
    )
)]
pub async fn complete(
    ctx: BucketContext,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CompleteRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let response = state.uploads.complete(ctx.bucket_id, request).await?;
    Ok(Json(response))
}
