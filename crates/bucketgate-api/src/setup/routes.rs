//! Route configuration and setup

use crate::auth::middleware::auth_middleware;
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use bucketgate_core::Config;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Build the application router
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Router {
    let public_routes = Router::new().route("/health", get(handlers::health::health_check));

    let protected_routes = Router::new()
        .route("/upload", post(handlers::upload::upload))
        .route("/presign", post(handlers::presigned_upload::presign))
        .route("/complete", post(handlers::presigned_upload::complete))
        .route(
            "/multipart/initiate",
            post(handlers::multipart_upload::initiate),
        )
        .route(
            "/multipart/presign",
            post(handlers::multipart_upload::presign_part),
        )
        .route(
            "/multipart/complete",
            post(handlers::multipart_upload::complete),
        )
        .route("/clean-up", post(handlers::cleanup::clean_up))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    tracing::info!(
        max_upload_size_bytes = config.max_upload_size_bytes(),
        "Request body limit configured"
    );

    public_routes
        .merge(protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(config.max_upload_size_bytes())),
        )
        .with_state(state)
}
