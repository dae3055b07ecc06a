//! Contract for the external vision check.

use async_trait::async_trait;

use crate::photo::Verdict;
use crate::types::DbId;

/// Where the vision service can read the photo.
#[derive(Debug, Clone)]
pub struct ImageRef {
    pub photo_id: DbId,
    /// Short-lived download URL.
    pub url: String,
    pub content_type: String,
}

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("Vision check timed out")]
    Timeout,

    #[error("Vision service unavailable: {0}")]
    Unavailable(String),

    #[error("Unexpected vision response: {0}")]
    InvalidResponse(String),
}

/// Content checks on a single photo. No side effects beyond the call.
#[async_trait]
pub trait VisionClient: Send + Sync {
    async fn check(&self, image: &ImageRef) -> Result<Verdict, VisionError>;
}
