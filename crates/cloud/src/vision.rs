//! HTTP client for the vision check service.
//!
//! `POST {VISION_API_URL}/v1/checks` with `{ "image_url", "content_type" }`
//! answers `{ "is_valid": bool, "warnings": [string] }`. Warnings this build
//! does not know are dropped.

use std::time::Duration;

use async_trait::async_trait;
use aurapix_core::photo::{parse_warnings, Verdict};
use aurapix_core::vision::{ImageRef, VisionClient, VisionError};
use serde::{Deserialize, Serialize};

use crate::http::{client_with_timeout, ensure_success, env_opt};

/// Vision service configuration.
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Total attempts before the fallback verdict is used.
    pub max_attempts: u32,
}

impl VisionConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var               | Default                 |
    /// |-----------------------|-------------------------|
    /// | `VISION_API_URL`      | `http://localhost:8090` |
    /// | `VISION_API_KEY`      | (none)                  |
    /// | `VISION_TIMEOUT_SECS` | `20`                    |
    /// | `VISION_MAX_ATTEMPTS` | `3`                     |
    pub fn from_env() -> Self {
        let api_url = std::env::var("VISION_API_URL").unwrap_or_else(|_| "http://localhost:8090".into());

        let timeout_secs: u64 = std::env::var("VISION_TIMEOUT_SECS")
            .unwrap_or_else(|_| "20".into())
            .parse()
            .expect("VISION_TIMEOUT_SECS must be a valid u64");

        let max_attempts: u32 = std::env::var("VISION_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "3".into())
            .parse()
            .expect("VISION_MAX_ATTEMPTS must be a valid u32");

        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: env_opt("VISION_API_KEY"),
            timeout: Duration::from_secs(timeout_secs),
            max_attempts,
        }
    }
}

#[derive(Debug, Serialize)]
struct CheckRequest<'a> {
    image_url: &'a str,
    content_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    is_valid: bool,
    #[serde(default)]
    warnings: Vec<String>,
}

impl From<CheckResponse> for Verdict {
    fn from(r: CheckResponse) -> Self {
        Verdict::new(r.is_valid, parse_warnings(&r.warnings))
    }
}

/// [`VisionClient`] over HTTP.
pub struct HttpVisionClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl HttpVisionClient {
    pub fn new(config: &VisionConfig) -> Self {
        Self {
            client: client_with_timeout(config.timeout),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

fn map_request_error(err: reqwest::Error) -> VisionError {
    if err.is_timeout() {
        VisionError::Timeout
    } else if err.is_decode() {
        VisionError::InvalidResponse(err.to_string())
    } else {
        VisionError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl VisionClient for HttpVisionClient {
    async fn check(&self, image: &ImageRef) -> Result<Verdict, VisionError> {
        let mut request = self
            .client
            .post(format!("{}/v1/checks", self.api_url))
            .json(&CheckRequest {
                image_url: &image.url,
                content_type: &image.content_type,
            });
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(map_request_error)?;
        let response = ensure_success(response)
            .await
            .map_err(|e| VisionError::Unavailable(format!("status {}: {}", e.status, e.body)))?;
        let body: CheckResponse = response.json().await.map_err(map_request_error)?;
        Ok(body.into())
    }
}

#[cfg(test)]
mod tests {
    use aurapix_core::photo::WarningKind;

    use super::*;

    #[test]
    fn response_maps_to_verdict_and_drops_unknown_warnings() {
        let body: CheckResponse = serde_json::from_str(
            r#"{"is_valid": true, "warnings": ["poor_lighting", "too_cute"]}"#,
        )
        .unwrap();
        let verdict: Verdict = body.into();
        assert!(verdict.is_valid);
        assert_eq!(verdict.warnings, vec![WarningKind::PoorLighting]);
    }

    #[test]
    fn blocking_warning_overrides_reported_validity() {
        let body: CheckResponse =
            serde_json::from_str(r#"{"is_valid": true, "warnings": ["is_screenshot"]}"#).unwrap();
        let verdict: Verdict = body.into();
        assert!(!verdict.is_valid);
    }

    #[test]
    fn missing_warnings_default_to_empty() {
        let body: CheckResponse = serde_json::from_str(r#"{"is_valid": false}"#).unwrap();
        let verdict: Verdict = body.into();
        assert!(!verdict.is_valid);
        assert!(verdict.warnings.is_empty());
    }
}
