//! Shared `reqwest` response helpers.

use std::time::Duration;

/// Non-2xx response from an upstream service.
#[derive(Debug)]
pub struct ApiError {
    pub status: u16,
    pub body: String,
}

/// Build a client with a whole-request timeout.
pub fn client_with_timeout(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Return the response unchanged on success, or its status and body text.
pub async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(ApiError {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// Read an environment variable, treating empty values as unset.
pub fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
