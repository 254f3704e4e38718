use crate::auth::BucketContext;
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use bucketgate_core::models::{CleanupRequest, SuccessResponse};
use std::sync::Arc;

/// Release the cached client of a multipart session early. Idempotent.
#[tracing::instrument(
    skip(state, ctx, request),
    fields(bucket_id = ctx.bucket_id, upload_id = %request.upload_id, operation = "clean_up")
)]
pub async fn clean_up(
    ctx: BucketContext,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CleanupRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let released = state
        .uploads
        .release(ctx.bucket_id, &request.upload_id).await;
    tracing::debug!(released, "Upload session released");
    Ok(Json(SuccessResponse { success: true }))
}
