//! Purchase credit ledger rows.

use aurapix_core::error::CoreError;
use aurapix_core::status::{CreditStatus, StatusId};
use aurapix_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `purchase_credits` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PurchaseCredit {
    pub id: DbId,
    pub owner_id: DbId,
    pub store: String,
    pub product_id: String,
    pub external_transaction_id: String,
    pub status_id: StatusId,
    pub batch_id: Option<DbId>,
    pub redeemed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PurchaseCredit {
    pub fn status(&self) -> Result<CreditStatus, CoreError> {
        CreditStatus::from_id(self.status_id)
    }
}

/// DTO for recording a validated purchase.
#[derive(Debug, Clone)]
pub struct CreateCredit {
    pub owner_id: DbId,
    pub store: String,
    pub product_id: String,
    pub external_transaction_id: String,
}
