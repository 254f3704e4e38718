//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::{Context, Result};
use bucketgate_core::Config;
use std::sync::Arc;

/// Initialize the entire application: telemetry, database, services and routes
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Fail fast on misconfiguration, key material included
    config.validate().context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config.environment())?;
    tracing::info!(config = ?config, "Configuration loaded and validated successfully");

    let pool = database::setup_database(&config).await?;
    let state = services::initialize_services(&config, pool)?;
    let router = routes::setup_routes(&config, state.clone());

    Ok((state, router))
}
