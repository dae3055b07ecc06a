//! Purchase verification against the App Store, the Play Store, and the
//! hosted checkout provider.

mod app_store;
mod checkout;
mod play_store;

use std::time::Duration;

use async_trait::async_trait;
use aurapix_core::credit::PurchaseStore;
use aurapix_core::purchase::{PurchaseClaim, PurchaseError, PurchaseVerdict, PurchaseVerifier};

pub use app_store::AppStoreVerifier;
pub use checkout::CheckoutVerifier;
pub use play_store::PlayStoreVerifier;

use crate::http::env_opt;

/// Timeout for a single store verification call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Purchase store configuration. A store without credentials is disabled
/// and claims for it are rejected with [`PurchaseError::NotConfigured`].
#[derive(Debug, Clone)]
pub struct PurchaseConfig {
    /// The single consumable product that grants a credit.
    pub product_id: String,
    pub apple_shared_secret: Option<String>,
    pub apple_use_sandbox: bool,
    pub play_package_name: Option<String>,
    pub play_access_token: Option<String>,
    pub checkout_api_url: String,
    pub checkout_secret_key: Option<String>,
    /// Shared secret for `Checkout-Signature` on inbound webhooks.
    pub checkout_webhook_secret: Option<String>,
}

impl PurchaseConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                  |
    /// |---------------------------|--------------------------|
    /// | `PRODUCT_ID`              | `profile_photo_pack`     |
    /// | `APPLE_SHARED_SECRET`     | (none)                   |
    /// | `APPLE_USE_SANDBOX`       | `false`                  |
    /// | `PLAY_PACKAGE_NAME`       | (none)                   |
    /// | `PLAY_ACCESS_TOKEN`       | (none)                   |
    /// | `CHECKOUT_API_URL`        | `https://api.stripe.com` |
    /// | `CHECKOUT_SECRET_KEY`     | (none)                   |
    /// | `CHECKOUT_WEBHOOK_SECRET` | (none)                   |
    pub fn from_env() -> Self {
        let product_id = std::env::var("PRODUCT_ID").unwrap_or_else(|_| "profile_photo_pack".into());

        let apple_use_sandbox: bool = std::env::var("APPLE_USE_SANDBOX")
            .unwrap_or_else(|_| "false".into())
            .parse()
            .expect("APPLE_USE_SANDBOX must be true or false");

        let checkout_api_url =
            std::env::var("CHECKOUT_API_URL").unwrap_or_else(|_| "https://api.stripe.com".into());

        Self {
            product_id,
            apple_shared_secret: env_opt("APPLE_SHARED_SECRET"),
            apple_use_sandbox,
            play_package_name: env_opt("PLAY_PACKAGE_NAME"),
            play_access_token: env_opt("PLAY_ACCESS_TOKEN"),
            checkout_api_url: checkout_api_url.trim_end_matches('/').to_string(),
            checkout_secret_key: env_opt("CHECKOUT_SECRET_KEY"),
            checkout_webhook_secret: env_opt("CHECKOUT_WEBHOOK_SECRET"),
        }
    }
}

/// Dispatches each claim to the verifier for its store.
pub struct StoreRouter {
    app_store: Option<AppStoreVerifier>,
    play_store: Option<PlayStoreVerifier>,
    checkout: Option<CheckoutVerifier>,
}

impl StoreRouter {
    pub fn new(config: &PurchaseConfig) -> Self {
        let client = crate::http::client_with_timeout(REQUEST_TIMEOUT);

        let app_store = config.apple_shared_secret.as_ref().map(|secret| {
            AppStoreVerifier::new(client.clone(), secret.clone(), config.apple_use_sandbox)
        });
        let play_store = match (&config.play_package_name, &config.play_access_token) {
            (Some(package), Some(token)) => Some(PlayStoreVerifier::new(
                client.clone(),
                package.clone(),
                token.clone(),
            )),
            _ => None,
        };
        let checkout = config.checkout_secret_key.as_ref().map(|key| {
            CheckoutVerifier::new(client.clone(), config.checkout_api_url.clone(), key.clone())
        });

        tracing::info!(
            app_store = app_store.is_some(),
            play_store = play_store.is_some(),
            checkout = checkout.is_some(),
            "Purchase verifiers configured"
        );

        Self {
            app_store,
            play_store,
            checkout,
        }
    }
}

#[async_trait]
impl PurchaseVerifier for StoreRouter {
    async fn verify(&self, claim: &PurchaseClaim) -> Result<PurchaseVerdict, PurchaseError> {
        match claim.store {
            PurchaseStore::AppStore => match self.app_store {
                Some(ref v) => v.verify(claim).await,
                None => Err(PurchaseError::NotConfigured("app_store")),
            },
            PurchaseStore::PlayStore => match self.play_store {
                Some(ref v) => v.verify(claim).await,
                None => Err(PurchaseError::NotConfigured("play_store")),
            },
            PurchaseStore::HostedCheckout => match self.checkout {
                Some(ref v) => v.verify(claim).await,
                None => Err(PurchaseError::NotConfigured("hosted_checkout")),
            },
        }
    }
}

pub(crate) fn map_request_error(err: reqwest::Error) -> PurchaseError {
    if err.is_timeout() {
        PurchaseError::Timeout
    } else if err.is_decode() {
        PurchaseError::InvalidResponse(err.to_string())
    } else {
        PurchaseError::Unavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn unconfigured() -> PurchaseConfig {
        PurchaseConfig {
            product_id: "pack".into(),
            apple_shared_secret: None,
            apple_use_sandbox: false,
            play_package_name: Some("com.example".into()),
            play_access_token: None,
            checkout_api_url: "http://localhost".into(),
            checkout_secret_key: None,
            checkout_webhook_secret: None,
        }
    }

    #[tokio::test]
    async fn unconfigured_store_is_rejected() {
        let router = StoreRouter::new(&unconfigured());
        for store in [
            PurchaseStore::AppStore,
            PurchaseStore::PlayStore,
            PurchaseStore::HostedCheckout,
        ] {
            let claim = PurchaseClaim {
                store,
                receipt: "r".into(),
                product_id: "pack".into(),
                transaction_id: "t".into(),
            };
            assert_matches!(
                router.verify(&claim).await,
                Err(PurchaseError::NotConfigured(_))
            );
        }
    }
}
