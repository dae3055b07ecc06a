//! Repository for the `purchase_credits` table.
//!
//! `redeem` is the only statement that moves a credit to `redeemed`, and
//! `restore` the only one that moves it back.

use aurapix_core::status::CreditStatus;
use aurapix_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::credit::{CreateCredit, PurchaseCredit};

const COLUMNS: &str = "\
    id, owner_id, store, product_id, external_transaction_id, status_id, \
    batch_id, redeemed_at, created_at, updated_at";

/// Provides persistence for the purchase credit ledger.
pub struct CreditRepo;

impl CreditRepo {
    /// Insert an unredeemed credit unless the transaction already has one.
    ///
    /// Returns `None` when another caller recorded the transaction first;
    /// re-read with [`CreditRepo::find_by_transaction`].
    pub async fn insert_if_absent(
        pool: &PgPool,
        input: &CreateCredit,
    ) -> Result<Option<PurchaseCredit>, sqlx::Error> {
        let query = format!(
            "INSERT INTO purchase_credits (owner_id, store, product_id, external_transaction_id, status_id) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (external_transaction_id) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PurchaseCredit>(&query)
            .bind(input.owner_id)
            .bind(&input.store)
            .bind(&input.product_id)
            .bind(&input.external_transaction_id)
            .bind(CreditStatus::Unredeemed.id())
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_transaction(
        pool: &PgPool,
        external_transaction_id: &str,
    ) -> Result<Option<PurchaseCredit>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM purchase_credits WHERE external_transaction_id = $1"
        );
        sqlx::query_as::<_, PurchaseCredit>(&query)
            .bind(external_transaction_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<PurchaseCredit>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM purchase_credits WHERE id = $1");
        sqlx::query_as::<_, PurchaseCredit>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// The owner's oldest unredeemed credit, if any.
    pub async fn oldest_unredeemed(
        pool: &PgPool,
        owner_id: DbId,
    ) -> Result<Option<PurchaseCredit>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM purchase_credits \
             WHERE owner_id = $1 AND status_id = $2 \
             ORDER BY created_at, id \
             LIMIT 1"
        );
        sqlx::query_as::<_, PurchaseCredit>(&query)
            .bind(owner_id)
            .bind(CreditStatus::Unredeemed.id())
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_owner(
        pool: &PgPool,
        owner_id: DbId,
    ) -> Result<Vec<PurchaseCredit>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM purchase_credits \
             WHERE owner_id = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, PurchaseCredit>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Atomically move an owned credit from `unredeemed` to `redeemed`.
    ///
    /// Returns `None` if the credit does not exist, belongs to someone
    /// else, or was already redeemed.
    pub async fn redeem(
        conn: &mut PgConnection,
        credit_id: DbId,
        owner_id: DbId,
    ) -> Result<Option<PurchaseCredit>, sqlx::Error> {
        let query = format!(
            "UPDATE purchase_credits SET status_id = $3, redeemed_at = NOW() \
             WHERE id = $1 AND owner_id = $2 AND status_id = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PurchaseCredit>(&query)
            .bind(credit_id)
            .bind(owner_id)
            .bind(CreditStatus::Redeemed.id())
            .bind(CreditStatus::Unredeemed.id())
            .fetch_optional(conn)
            .await
    }

    /// Link a redeemed credit to the batch it paid for.
    pub async fn attach_batch(
        conn: &mut PgConnection,
        credit_id: DbId,
        batch_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE purchase_credits SET batch_id = $2 WHERE id = $1")
            .bind(credit_id)
            .bind(batch_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Give back a credit consumed by a batch that produced nothing.
    ///
    /// Only applies while the credit is still redeemed for `batch_id`, so
    /// a repeated call is a no-op. Returns whether a row changed.
    pub async fn restore(
        conn: &mut PgConnection,
        credit_id: DbId,
        batch_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE purchase_credits SET status_id = $3, redeemed_at = NULL, batch_id = NULL \
             WHERE id = $1 AND batch_id = $2 AND status_id = $4",
        )
        .bind(credit_id)
        .bind(batch_id)
        .bind(CreditStatus::Unredeemed.id())
        .bind(CreditStatus::Redeemed.id())
        .execute(conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
