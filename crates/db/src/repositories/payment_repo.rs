//! Repository for the `payments` audit table.

use chrono::Utc;
use genselfie_core::types::DbId;

use crate::models::payment::{CreatePayment, Payment};
use crate::DbPool;

const COLUMNS: &str = "id, payment_type, external_id, amount_cents, currency, \
    status, generation_id, created_at, completed_at";

pub struct PaymentRepo;

impl PaymentRepo {
    pub async fn create(pool: &DbPool, input: &CreatePayment) -> Result<Payment, sqlx::Error> {
        let query = format!(
            "INSERT INTO payments
                (payment_type, external_id, amount_cents, currency, status, created_at)
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Payment>(&query)
            .bind(&input.payment_type)
            .bind(&input.external_id)
            .bind(input.amount_cents)
            .bind(&input.currency)
            .bind(Utc::now())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_external_id(
        pool: &DbPool,
        external_id: &str,
    ) -> Result<Option<Payment>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM payments WHERE external_id = ?1");
        sqlx::query_as::<_, Payment>(&query)
            .bind(external_id)
            .fetch_optional(pool)
            .await
    }

    /// Mark a payment settled and link it to the ledger row it admitted.
    /// Returns `true` if a row was updated.
    pub async fn mark_completed(
        pool: &DbPool,
        external_id: &str,
        generation_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE payments SET status = 'completed', generation_id = ?1, completed_at = ?2
             WHERE external_id = ?3 AND status = 'pending'",
        )
        .bind(generation_id)
        .bind(Utc::now())
        .bind(external_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
