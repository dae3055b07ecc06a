//! Repository for the `accounts` table.

use aurapix_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::account::Account;

const COLUMNS: &str = "id, subject, created_at, updated_at";

/// Provides lookup and per-owner locking for accounts.
pub struct AccountRepo;

impl AccountRepo {
    /// Return the account for `subject`, creating it on first sight.
    pub async fn find_or_create(pool: &PgPool, subject: &str) -> Result<Account, sqlx::Error> {
        let insert = format!(
            "INSERT INTO accounts (subject) VALUES ($1) \
             ON CONFLICT (subject) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        if let Some(account) = sqlx::query_as::<_, Account>(&insert)
            .bind(subject)
            .fetch_optional(pool)
            .await?
        {
            return Ok(account);
        }

        let select = format!("SELECT {COLUMNS} FROM accounts WHERE subject = $1");
        sqlx::query_as::<_, Account>(&select)
            .bind(subject)
            .fetch_one(pool)
            .await
    }

    /// Take a row lock on the owner for the rest of the transaction.
    ///
    /// Every mutation guarded by a per-owner invariant (photo quota, batch
    /// start, sample start, profile selection) locks here first, which
    /// serialises them per owner.
    pub async fn lock(conn: &mut PgConnection, owner_id: DbId) -> Result<bool, sqlx::Error> {
        let row: Option<(DbId,)> = sqlx::query_as("SELECT id FROM accounts WHERE id = $1 FOR UPDATE")
            .bind(owner_id)
            .fetch_optional(conn)
            .await?;
        Ok(row.is_some())
    }
}
