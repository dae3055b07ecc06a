//! S3-compatible object storage (AWS, MinIO, R2).

use std::time::Duration;

use async_trait::async_trait;
use aurapix_core::storage::{ObjectMeta, ObjectStorage, PresignedUrl, StorageError};
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client as S3Client;

use crate::http::env_opt;

/// Storage configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for MinIO / LocalStack.
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    /// Static credentials; when unset the default AWS provider chain is used.
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub upload_url_expiry: Duration,
    pub download_url_expiry: Duration,
}

impl StorageConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default          |
    /// |----------------------------|------------------|
    /// | `S3_BUCKET`                | `aurapix-photos` |
    /// | `S3_REGION`                | `us-east-1`      |
    /// | `S3_ENDPOINT_URL`          | (none)           |
    /// | `S3_FORCE_PATH_STYLE`      | `false`          |
    /// | `S3_ACCESS_KEY_ID`         | (none)           |
    /// | `S3_SECRET_ACCESS_KEY`     | (none)           |
    /// | `UPLOAD_URL_EXPIRY_SECS`   | `900`            |
    /// | `DOWNLOAD_URL_EXPIRY_SECS` | `3600`           |
    pub fn from_env() -> Self {
        let bucket = std::env::var("S3_BUCKET").unwrap_or_else(|_| "aurapix-photos".into());
        let region = std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into());

        let force_path_style: bool = std::env::var("S3_FORCE_PATH_STYLE")
            .unwrap_or_else(|_| "false".into())
            .parse()
            .expect("S3_FORCE_PATH_STYLE must be true or false");

        let upload_secs: u64 = std::env::var("UPLOAD_URL_EXPIRY_SECS")
            .unwrap_or_else(|_| "900".into())
            .parse()
            .expect("UPLOAD_URL_EXPIRY_SECS must be a valid u64");

        let download_secs: u64 = std::env::var("DOWNLOAD_URL_EXPIRY_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("DOWNLOAD_URL_EXPIRY_SECS must be a valid u64");

        Self {
            bucket,
            region,
            endpoint_url: env_opt("S3_ENDPOINT_URL"),
            force_path_style,
            access_key_id: env_opt("S3_ACCESS_KEY_ID"),
            secret_access_key: env_opt("S3_SECRET_ACCESS_KEY"),
            upload_url_expiry: Duration::from_secs(upload_secs),
            download_url_expiry: Duration::from_secs(download_secs),
        }
    }
}

/// [`ObjectStorage`] backed by an S3 bucket.
pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    pub async fn new(config: &StorageConfig) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = S3ConfigBuilder::from(&aws_config);
        if let Some(ref endpoint_url) = config.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }
        if let (Some(key), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            builder = builder.credentials_provider(Credentials::new(
                key.clone(),
                secret.clone(),
                None,
                None,
                "aurapix-static",
            ));
        }

        tracing::info!(
            bucket = %config.bucket,
            region = %config.region,
            "S3 storage initialized"
        );

        Self {
            client: S3Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        }
    }
}

fn presigning_config(expires_in: Duration) -> Result<PresigningConfig, StorageError> {
    PresigningConfig::expires_in(expires_in).map_err(|e| StorageError::Presign(e.to_string()))
}

fn expiry_from_now(expires_in: Duration) -> aurapix_core::types::Timestamp {
    chrono::Utc::now() + chrono::Duration::from_std(expires_in).unwrap_or_default()
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<PresignedUrl, StorageError> {
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presigning_config(expires_in)?)
            .await
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        Ok(PresignedUrl {
            url: presigned.uri().to_string(),
            expires_at: expiry_from_now(expires_in),
        })
    }

    async fn presign_download(&self, key: &str, expires_in: Duration) -> Result<PresignedUrl, StorageError> {
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning_config(expires_in)?)
            .await
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        Ok(PresignedUrl {
            url: presigned.uri().to_string(),
            expires_at: expiry_from_now(expires_in),
        })
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => Ok(Some(ObjectMeta {
                size_bytes: output.content_length().unwrap_or_default(),
                content_type: output.content_type().map(str::to_string),
            })),
            Err(e) => {
                if e.as_service_error()
                    .map(|e| e.is_not_found())
                    .unwrap_or(false)
                {
                    Ok(None)
                } else {
                    Err(StorageError::Request(e.to_string()))
                }
            }
        }
    }
}
