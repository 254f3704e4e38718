use crate::auth::models::BucketContext;
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bucketgate_core::constants::ACCESS_TOKEN_HEADER;
use bucketgate_core::models::AccessClaims;
use bucketgate_core::{AppError, TokenOutcome};
use std::sync::Arc;

fn reject(reason: &str) -> Response {
    tracing::debug!(reason = %reason, "Access token rejected");
    HttpAppError(AppError::Unauthorized(reason.to_string())).into_response()
}

/// Verify the `X-Access-Token` header and attach the caller's [`BucketContext`].
///
/// Every failure renders the same 401 body; the reason is only logged.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match request
        .headers()
        .get(ACCESS_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        Some(token) => token,
        None => return reject("missing access token"),
    };

    let claims = match state.tokens.verify_or_decrypt::<AccessClaims>(token) {
        TokenOutcome::Authenticated(claims) => claims,
        TokenOutcome::Failed(reason) => return reject(&reason.to_string()),
    };

    tracing::debug!(bucket_id = claims.bucket_id, "Access token verified");
    request.extensions_mut().insert(BucketContext {
        bucket_id: claims.bucket_id,
    });

    next.run(request).await
}
