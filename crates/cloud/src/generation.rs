//! HTTP client for the image generation service.
//!
//! - `POST {GENERATION_API_URL}/v1/jobs` with a [`GenerationRequest`]
//!   returns `{ "job_id": string }`.
//! - `GET {GENERATION_API_URL}/v1/jobs/{job_id}` returns a [`JobSnapshot`].

use std::time::Duration;

use async_trait::async_trait;
use aurapix_core::generation::{
    GenerationRequest, GenerationService, GenerationServiceError, JobSnapshot,
};
use serde::Deserialize;

use crate::http::{client_with_timeout, ensure_success, env_opt};

/// Timeout for a single submit or status call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Generation service configuration.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    /// How often the monitor polls in-flight jobs.
    pub poll_interval: Duration,
    /// Jobs running longer than this are finalised with what they have.
    pub job_timeout: Duration,
}

impl GenerationConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                 |
    /// |---------------------------------|-------------------------|
    /// | `GENERATION_API_URL`            | `http://localhost:8091` |
    /// | `GENERATION_API_KEY`            | (none)                  |
    /// | `GENERATION_POLL_INTERVAL_SECS` | `5`                     |
    /// | `GENERATION_JOB_TIMEOUT_SECS`   | `3600`                  |
    pub fn from_env() -> Self {
        let api_url =
            std::env::var("GENERATION_API_URL").unwrap_or_else(|_| "http://localhost:8091".into());

        let poll_secs: u64 = std::env::var("GENERATION_POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("GENERATION_POLL_INTERVAL_SECS must be a valid u64");

        let timeout_secs: u64 = std::env::var("GENERATION_JOB_TIMEOUT_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("GENERATION_JOB_TIMEOUT_SECS must be a valid u64");

        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: env_opt("GENERATION_API_KEY"),
            poll_interval: Duration::from_secs(poll_secs.max(1)),
            job_timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

/// [`GenerationService`] over HTTP.
pub struct HttpGenerationClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl HttpGenerationClient {
    pub fn new(config: &GenerationConfig) -> Self {
        Self {
            client: client_with_timeout(REQUEST_TIMEOUT),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key {
            Some(ref key) => request.bearer_auth(key),
            None => request,
        }
    }
}

fn map_request_error(err: reqwest::Error) -> GenerationServiceError {
    if err.is_timeout() {
        GenerationServiceError::Timeout
    } else {
        GenerationServiceError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl GenerationService for HttpGenerationClient {
    async fn submit(&self, request: &GenerationRequest) -> Result<String, GenerationServiceError> {
        let response = self
            .authorize(self.client.post(format!("{}/v1/jobs", self.api_url)))
            .json(request)
            .send()
            .await
            .map_err(map_request_error)?;

        let response = ensure_success(response)
            .await
            .map_err(|e| GenerationServiceError::Rejected {
                status: e.status,
                body: e.body,
            })?;
        let body: SubmitResponse = response.json().await.map_err(map_request_error)?;
        Ok(body.job_id)
    }

    async fn fetch(&self, external_job_id: &str) -> Result<JobSnapshot, GenerationServiceError> {
        let response = self
            .authorize(
                self.client
                    .get(format!("{}/v1/jobs/{}", self.api_url, external_job_id)),
            )
            .send()
            .await
            .map_err(map_request_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GenerationServiceError::UnknownJob(external_job_id.to_string()));
        }
        let response = ensure_success(response)
            .await
            .map_err(|e| GenerationServiceError::Rejected {
                status: e.status,
                body: e.body,
            })?;
        response.json().await.map_err(map_request_error)
    }
}

#[cfg(test)]
mod tests {
    use aurapix_core::generation::RemoteJobState;

    use super::*;

    #[test]
    fn snapshot_with_outputs_parses() {
        let snap: JobSnapshot = serde_json::from_str(
            r#"{
                "state": "succeeded",
                "outputs": [
                    {"scenario": "studio", "storage_key": "generated/7/a.png"},
                    {"scenario": "business", "storage_key": "generated/7/b.png"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(snap.state, RemoteJobState::Succeeded);
        assert_eq!(snap.outputs.len(), 2);
        assert_eq!(snap.outputs[1].scenario, "business");
    }

    #[test]
    fn failed_snapshot_carries_error() {
        let snap: JobSnapshot =
            serde_json::from_str(r#"{"state": "failed", "error": "gpu lost"}"#).unwrap();
        assert!(snap.state.is_terminal());
        assert_eq!(snap.error.as_deref(), Some("gpu lost"));
    }
}
