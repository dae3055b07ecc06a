//! Bearer-token validation.
//!
//! Tokens are HS256-signed JWTs issued by the external identity provider.
//! This service only validates them and reads the subject.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims read from every access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject -- the identity provider's user id.
    pub sub: String,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// Configuration for token validation.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret shared with the identity provider.
    pub secret: String,
    /// When set, tokens must carry this `iss` claim.
    pub issuer: Option<String>,
}

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var      | Required | Default |
    /// |--------------|----------|---------|
    /// | `JWT_SECRET` | **yes**  | --      |
    /// | `JWT_ISSUER` | no       | (none)  |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is not set or is empty.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "JWT_SECRET must not be empty");

        let issuer = std::env::var("JWT_ISSUER").ok().filter(|s| !s.is_empty());

        Self { secret, issuer }
    }
}

/// Validate and decode an access token, returning the embedded [`Claims`].
///
/// Checks the signature, expiration, and issuer when one is configured.
pub fn validate_token(
    token: &str,
    config: &JwtConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default(); // HS256, validates exp
    if let Some(ref issuer) = config.issuer {
        validation.set_issuer(&[issuer]);
    }

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )?;
    if token_data.claims.sub.trim().is_empty() {
        return Err(jsonwebtoken::errors::ErrorKind::InvalidSubject.into());
    }
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{encode, EncodingKey, Header};

    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            issuer: None,
        }
    }

    fn token(sub: &str, exp_offset: i64, iss: Option<&str>, secret: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            exp: now + exp_offset,
            iat: now,
            iss: iss.map(str::to_string),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("encoding should succeed")
    }

    #[test]
    fn test_valid_token_yields_subject() {
        let config = test_config();
        let claims = validate_token(&token("user-42", 600, None, &config.secret), &config)
            .expect("token validation should succeed");
        assert_eq!(claims.sub, "user-42");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_expired_token_fails() {
        let config = test_config();
        // Well beyond the default 60-second leeway.
        let result = validate_token(&token("user-1", -300, None, &config.secret), &config);
        assert!(result.is_err(), "expired token must fail validation");
    }

    #[test]
    fn test_different_secret_fails() {
        let config = test_config();
        let result = validate_token(&token("user-1", 600, None, "secret-bravo"), &config);
        assert!(result.is_err(), "token signed with a different secret must fail");
    }

    #[test]
    fn test_issuer_is_enforced_when_configured() {
        let config = JwtConfig {
            issuer: Some("https://id.aurapix.test".to_string()),
            ..test_config()
        };

        let good = token("user-1", 600, Some("https://id.aurapix.test"), &config.secret);
        assert!(validate_token(&good, &config).is_ok());

        let foreign = token("user-1", 600, Some("https://elsewhere.test"), &config.secret);
        assert!(validate_token(&foreign, &config).is_err());

        let missing = token("user-1", 600, None, &config.secret);
        assert!(validate_token(&missing, &config).is_err());
    }

    #[test]
    fn test_blank_subject_is_rejected() {
        let config = test_config();
        let result = validate_token(&token("  ", 600, None, &config.secret), &config);
        assert!(result.is_err());
    }
}
