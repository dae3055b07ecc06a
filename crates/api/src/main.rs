use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use aurapix_cloud::generation::{GenerationConfig, HttpGenerationClient};
use aurapix_cloud::purchase::{PurchaseConfig, StoreRouter};
use aurapix_cloud::s3::{S3Storage, StorageConfig};
use aurapix_cloud::vision::{HttpVisionClient, VisionConfig};
use aurapix_pipeline::{Pipeline, PipelineDeps};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aurapix_api::config::{pipeline_settings, ServerConfig};
use aurapix_api::router::build_app_router;
use aurapix_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "aurapix_api=debug,aurapix_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let storage_config = StorageConfig::from_env();
    let vision_config = VisionConfig::from_env();
    let generation_config = GenerationConfig::from_env();
    let purchase_config = PurchaseConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        bucket = %storage_config.bucket,
        product_id = %purchase_config.product_id,
        "Loaded server configuration",
    );

    // --- Database ---
    let pool = aurapix_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    aurapix_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    aurapix_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- External collaborators ---
    let deps = PipelineDeps {
        storage: Arc::new(S3Storage::new(&storage_config).await),
        vision: Arc::new(HttpVisionClient::new(&vision_config)),
        generator: Arc::new(HttpGenerationClient::new(&generation_config)),
        verifier: Arc::new(StoreRouter::new(&purchase_config)),
    };
    let settings = pipeline_settings(
        &storage_config,
        &vision_config,
        &generation_config,
        &purchase_config,
    );
    let pipeline = Pipeline::new(pool.clone(), deps, settings);

    // --- Generation monitor ---
    let monitor_cancel = CancellationToken::new();
    let monitor_handle = tokio::spawn({
        let monitor = pipeline.monitor();
        let cancel = monitor_cancel.clone();
        async move { monitor.run(cancel).await }
    });
    tracing::info!("Generation monitor spawned");

    // --- App ---
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    let config = Arc::new(config);
    let state = AppState {
        pool,
        config: Arc::clone(&config),
        pipeline,
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    monitor_cancel.cancel();
    if tokio::time::timeout(shutdown_timeout, monitor_handle)
        .await
        .is_err()
    {
        tracing::warn!("Generation monitor did not stop in time");
    } else {
        tracing::info!("Generation monitor stopped");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
