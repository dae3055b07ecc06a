//! Purchase credit rules.
//!
//! A credit is one consumable right to one full generation. It is created
//! from a validated store transaction (at most one credit per transaction)
//! and redeemed exactly once when a batch starts. The only way back from
//! `redeemed` is the zero-image compensation in the generation flow.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::status::CreditStatus;
use crate::types::DbId;

const ENTITY: &str = "PurchaseCredit";

/// Where a purchase was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStore {
    AppStore,
    PlayStore,
    HostedCheckout,
}

impl PurchaseStore {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AppStore => "app_store",
            Self::PlayStore => "play_store",
            Self::HostedCheckout => "hosted_checkout",
        }
    }

    /// Parse a store name. Accepts the client platform aliases `ios`,
    /// `android` and `web` as well as the canonical names.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "app_store" | "ios" => Ok(Self::AppStore),
            "play_store" | "android" => Ok(Self::PlayStore),
            "hosted_checkout" | "web" => Ok(Self::HostedCheckout),
            other => Err(CoreError::Validation(format!(
                "Unknown purchase platform '{other}'"
            ))),
        }
    }
}

/// Answer to "may this owner start a full generation?".
///
/// Clients know a credit as a payment: on the wire this is
/// `{hasAccess, paymentId}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessStatus {
    #[serde(rename = "hasAccess")]
    pub has_unredeemed_credit: bool,
    #[serde(rename = "paymentId")]
    pub credit_id: Option<DbId>,
}

impl AccessStatus {
    /// Build from the oldest unredeemed credit, if any.
    pub fn from_oldest_unredeemed(credit_id: Option<DbId>) -> Self {
        Self {
            has_unredeemed_credit: credit_id.is_some(),
            credit_id,
        }
    }
}

/// Reject a purchase for a product other than the configured consumable.
pub fn ensure_expected_product(product_id: &str, expected: &str) -> Result<(), CoreError> {
    if product_id == expected {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Unknown product '{product_id}'"
        )))
    }
}

/// A transaction that already has a credit must belong to the caller.
pub fn ensure_transaction_owner(
    existing_owner: DbId,
    caller: DbId,
    transaction_id: &str,
) -> Result<(), CoreError> {
    if existing_owner == caller {
        Ok(())
    } else {
        Err(CoreError::Conflict(format!(
            "Transaction '{transaction_id}' is already linked to another account"
        )))
    }
}

/// Explain why a conditional `unredeemed -> redeemed` update matched no row.
///
/// `current` is the credit as re-read after the failed update, if it exists.
/// A credit owned by someone else is reported as not found so its existence
/// does not leak.
pub fn redeem_failure(
    credit_id: DbId,
    caller: DbId,
    current: Option<(DbId, CreditStatus)>,
) -> CoreError {
    match current {
        Some((owner, CreditStatus::Redeemed)) if owner == caller => {
            CoreError::CreditAlreadyRedeemed { credit_id }
        }
        Some((owner, CreditStatus::Unredeemed)) if owner == caller => CoreError::Conflict(
            format!("Credit {credit_id} changed while it was being redeemed"),
        ),
        _ => CoreError::NotFound {
            entity: ENTITY,
            id: credit_id,
        },
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn access_status_uses_payment_names_on_the_wire() {
        let json = serde_json::to_value(AccessStatus::from_oldest_unredeemed(Some(4))).unwrap();
        assert_eq!(json, serde_json::json!({"hasAccess": true, "paymentId": 4}));

        let none = serde_json::to_value(AccessStatus::from_oldest_unredeemed(None)).unwrap();
        assert_eq!(none, serde_json::json!({"hasAccess": false, "paymentId": null}));
    }

    #[test]
    fn store_parse_accepts_aliases() {
        assert_eq!(PurchaseStore::parse("ios").unwrap(), PurchaseStore::AppStore);
        assert_eq!(
            PurchaseStore::parse("android").unwrap(),
            PurchaseStore::PlayStore
        );
        assert_eq!(
            PurchaseStore::parse("hosted_checkout").unwrap(),
            PurchaseStore::HostedCheckout
        );
        assert!(PurchaseStore::parse("fax").is_err());
    }

    #[test]
    fn access_reflects_credit_presence() {
        let none = AccessStatus::from_oldest_unredeemed(None);
        assert!(!none.has_unredeemed_credit);
        let some = AccessStatus::from_oldest_unredeemed(Some(4));
        assert!(some.has_unredeemed_credit);
        assert_eq!(some.credit_id, Some(4));
    }

    #[test]
    fn product_must_match() {
        assert!(ensure_expected_product("profile_pack", "profile_pack").is_ok());
        assert!(ensure_expected_product("other", "profile_pack").is_err());
    }

    #[test]
    fn transaction_owned_by_other_account_conflicts() {
        assert!(ensure_transaction_owner(1, 1, "tx").is_ok());
        assert_matches!(
            ensure_transaction_owner(1, 2, "tx"),
            Err(CoreError::Conflict(_))
        );
    }

    #[test]
    fn second_redeem_reports_already_redeemed() {
        assert_matches!(
            redeem_failure(5, 1, Some((1, CreditStatus::Redeemed))),
            CoreError::CreditAlreadyRedeemed { credit_id: 5 }
        );
    }

    #[test]
    fn foreign_or_missing_credit_is_not_found() {
        assert_matches!(
            redeem_failure(5, 1, Some((2, CreditStatus::Unredeemed))),
            CoreError::NotFound { id: 5, .. }
        );
        assert_matches!(
            redeem_failure(5, 1, Some((2, CreditStatus::Redeemed))),
            CoreError::NotFound { .. }
        );
        assert_matches!(redeem_failure(5, 1, None), CoreError::NotFound { .. });
    }
}
