//! Object storage contract and upload rules.
//!
//! Photo bytes never pass through the API: clients `PUT` directly to a
//! presigned URL and then confirm the upload by storage key.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Largest accepted photo, in bytes (20 MiB).
pub const MAX_UPLOAD_BYTES: i64 = 20 * 1024 * 1024;

/// Accepted content types and the extension used in storage keys.
pub const ALLOWED_CONTENT_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/heic", "heic"),
    ("image/webp", "webp"),
];

/// A time-limited URL for one object.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrl {
    pub url: String,
    pub expires_at: Timestamp,
}

/// Metadata returned by a `HEAD` on an existing object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub size_bytes: i64,
    pub content_type: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to presign URL: {0}")]
    Presign(String),

    #[error("Object storage request failed: {0}")]
    Request(String),
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        CoreError::Internal(err.to_string())
    }
}

/// Object storage used for source photos, samples, and generated images.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Presign a single `PUT` of `content_type` to `key`.
    async fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<PresignedUrl, StorageError>;

    /// Presign a `GET` of `key`.
    async fn presign_download(&self, key: &str, expires_in: Duration) -> Result<PresignedUrl, StorageError>;

    /// `HEAD` the object. `Ok(None)` means it does not exist.
    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StorageError>;
}

/// Extension for an accepted content type.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    ALLOWED_CONTENT_TYPES
        .iter()
        .find(|(ct, _)| ct.eq_ignore_ascii_case(content_type))
        .map(|(_, ext)| *ext)
}

/// Check an upload request and return the storage key extension.
pub fn validate_upload(content_type: &str, size_bytes: i64) -> Result<&'static str, CoreError> {
    let ext = extension_for(content_type).ok_or_else(|| {
        CoreError::Validation(format!("Unsupported content type '{content_type}'"))
    })?;
    if size_bytes < 1 || size_bytes > MAX_UPLOAD_BYTES {
        return Err(CoreError::Validation(format!(
            "File size must be between 1 and {MAX_UPLOAD_BYTES} bytes, got {size_bytes}"
        )));
    }
    Ok(ext)
}

/// A fresh key for a source photo: `photos/{owner_id}/{uuid}.{ext}`.
pub fn photo_storage_key(owner_id: DbId, ext: &str) -> String {
    format!("photos/{owner_id}/{}.{ext}", uuid::Uuid::new_v4())
}

/// Whether `key` lies in the owner's photo prefix.
pub fn is_owner_photo_key(owner_id: DbId, key: &str) -> bool {
    key.strip_prefix(&format!("photos/{owner_id}/"))
        .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
}
