use aurapix_core::error::CoreError;
use aurapix_pipeline::error::PipelineError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `aurapix_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Core(e) => Self::Core(e),
            PipelineError::Database(e) => Self::Database(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::Database(err) => classify_sqlx_error(err),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::UnknownStorageKey(_) => {
            (StatusCode::NOT_FOUND, "UNKNOWN_STORAGE_KEY", err.to_string())
        }
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
        CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
        CoreError::QuotaExceeded { .. } => (
            StatusCode::TOO_MANY_REQUESTS,
            "QUOTA_EXCEEDED",
            err.to_string(),
        ),
        CoreError::AlreadyInProgress { .. } => {
            (StatusCode::CONFLICT, "ALREADY_IN_PROGRESS", err.to_string())
        }
        CoreError::InvalidStateTransition { .. } => (
            StatusCode::CONFLICT,
            "INVALID_STATE_TRANSITION",
            err.to_string(),
        ),
        CoreError::CreditNotAvailable => (
            StatusCode::PAYMENT_REQUIRED,
            "CREDIT_NOT_AVAILABLE",
            err.to_string(),
        ),
        CoreError::CreditAlreadyRedeemed { credit_id } => {
            tracing::info!(credit_id, "Redemption lost to a concurrent request");
            (
                StatusCode::CONFLICT,
                "CREDIT_ALREADY_REDEEMED",
                "You may already have started a generation".to_string(),
            )
        }
        CoreError::ExternalServiceTimeout { service, detail } => {
            tracing::warn!(service, detail = %detail, "External service timed out");
            (
                StatusCode::GATEWAY_TIMEOUT,
                "EXTERNAL_SERVICE_TIMEOUT",
                format!("The {service} service did not respond in time"),
            )
        }
        CoreError::PartialGenerationFailure { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "PARTIAL_GENERATION_FAILURE",
            err.to_string(),
        ),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            internal()
        }
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            internal()
        }
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}
