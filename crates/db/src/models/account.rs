//! Owner accounts keyed by identity-provider subject.

use aurapix_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `accounts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Account {
    pub id: DbId,
    pub subject: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
