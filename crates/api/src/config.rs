use aurapix_cloud::generation::GenerationConfig;
use aurapix_cloud::purchase::PurchaseConfig;
use aurapix_cloud::s3::StorageConfig;
use aurapix_cloud::vision::VisionConfig;
use aurapix_core::retry::RetryPolicy;
use aurapix_pipeline::PipelineSettings;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except `DATABASE_URL` and `JWT_SECRET` have defaults suitable
/// for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long background tasks get to stop after the server drains.
    pub shutdown_timeout_secs: u64,
    /// Upper bound for the checkout long-poll (default: `25`). Kept below
    /// the request timeout.
    pub checkout_wait_max_secs: u64,
    pub database_url: String,
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `HOST`                   | `0.0.0.0`               |
    /// | `PORT`                   | `3000`                  |
    /// | `CORS_ORIGINS`           | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`  | `30`                    |
    /// | `CHECKOUT_WAIT_MAX_SECS` | `25`                    |
    /// | `DATABASE_URL`           | **required**            |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let checkout_wait_max_secs: u64 = std::env::var("CHECKOUT_WAIT_MAX_SECS")
            .unwrap_or_else(|_| "25".into())
            .parse()
            .expect("CHECKOUT_WAIT_MAX_SECS must be a valid u64");

        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            checkout_wait_max_secs,
            database_url,
            jwt: JwtConfig::from_env(),
        }
    }
}

/// Assemble pipeline tunables from the adapter configs.
///
/// Retry backoff starts at one second and doubles per attempt.
pub fn pipeline_settings(
    storage: &StorageConfig,
    vision: &VisionConfig,
    generation: &GenerationConfig,
    purchase: &PurchaseConfig,
) -> PipelineSettings {
    PipelineSettings {
        upload_url_expiry: storage.upload_url_expiry,
        download_url_expiry: storage.download_url_expiry,
        vision_timeout: vision.timeout,
        vision_retry: RetryPolicy {
            max_attempts: vision.max_attempts,
            jitter: true,
            ..RetryPolicy::default()
        },
        job_timeout: generation.job_timeout,
        poll_interval: generation.poll_interval,
        product_id: purchase.product_id.clone(),
        checkout_webhook_secret: purchase.checkout_webhook_secret.clone(),
        ..PipelineSettings::default()
    }
}
