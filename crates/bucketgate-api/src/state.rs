//! Application state shared by all handlers.

use crate::services::upload::UploadCoordinator;
use bucketgate_core::TokenService;
use bucketgate_db::FileRepository;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Verifies access tokens and inline bucket configs
    pub tokens: TokenService,
    pub uploads: UploadCoordinator,
    /// Used directly only by the health probe
    pub files: Arc<dyn FileRepository>,
}
