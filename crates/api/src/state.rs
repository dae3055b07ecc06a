use std::sync::Arc;

use aurapix_pipeline::Pipeline;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: the pool and pipeline services are reference-counted.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: aurapix_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Photo, credit, generation, and curation services.
    pub pipeline: Pipeline,
}
