use crate::error::HttpAppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use bucketgate_core::AppError;

/// Bucket scope of an authenticated request, taken from the access token's claims and
/// stored in request extensions by the auth middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketContext {
    pub bucket_id: i64,
}

// Extracted from parts rather than through `Extension` so it composes with `Multipart`.
impl<S> FromRequestParts<S> for BucketContext
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<BucketContext>()
            .copied()
            .ok_or_else(|| HttpAppError(AppError::Unauthorized("Missing bucket context".into())))
    }
}
