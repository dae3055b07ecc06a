//! JWT-based authentication extractor for Axum handlers.

use aurapix_core::error::CoreError;
use aurapix_core::types::DbId;
use aurapix_db::repositories::AccountRepo;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated owner extracted from a JWT Bearer token in the
/// `Authorization` header.
///
/// The token subject is mapped to an internal account, created on first
/// sight. Every owner-scoped handler takes this as a parameter.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Internal account id; all photos, credits, and batches hang off it.
    pub owner_id: DbId,
    /// The identity provider's subject.
    pub subject: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing Authorization header".into(),
                ))
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid Authorization format. Expected: Bearer <token>".into(),
            ))
        })?;

        let claims = validate_token(token, &state.config.jwt).map_err(|_| {
            AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
        })?;

        let account = AccountRepo::find_or_create(&state.pool, &claims.sub).await?;

        Ok(AuthUser {
            owner_id: account.id,
            subject: claims.sub,
        })
    }
}
