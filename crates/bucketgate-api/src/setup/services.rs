//! Service and repository wiring

use crate::services::upload::UploadCoordinator;
use crate::state::AppState;
use anyhow::Result;
use bucketgate_core::{Config, IdGenerator};
use bucketgate_db::{FileRepository, PostgresBucketRepository, PostgresFileRepository};
use bucketgate_storage::{S3ClientFactory, SigningClientCache};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

/// Build the shared application state on top of a connected pool
pub fn initialize_services(config: &Config, pool: PgPool) -> Result<Arc<AppState>> {
    let encryption = config.encryption_service()?;
    let tokens = config.token_service()?;
    let ids = IdGenerator::new(
        config.snowflake_datacenter_id(),
        config.snowflake_worker_id(),
    )?;

    let cache = Arc::new(SigningClientCache::new(Duration::from_secs(
        config.client_cache_ttl_secs(),
    )));
    cache.spawn_sweeper(Duration::from_secs(config.client_cache_sweep_secs()));

    let files: Arc<dyn FileRepository> = Arc::new(PostgresFileRepository::new(pool.clone()));
    let buckets = Arc::new(PostgresBucketRepository::new(pool));

    let uploads = UploadCoordinator::new(
        ids,
        cache,
        Arc::new(S3ClientFactory),
        encryption,
        files.clone(),
        buckets,
        Duration::from_secs(config.presign_expiry_secs()),
    );

    tracing::info!(
        token_mode = ?tokens.mode(),
        datacenter_id = config.snowflake_datacenter_id(),
        worker_id = config.snowflake_worker_id(),
        "Services initialized"
    );

    Ok(Arc::new(AppState {
        tokens,
        uploads,
        files,
    }))
}
