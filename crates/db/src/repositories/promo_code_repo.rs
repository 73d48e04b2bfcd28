//! Repository for the `promo_codes` table.
//!
//! `consume` is the contended path: the usability check and the use-count
//! decrement are one guarded `UPDATE ... RETURNING`, so two concurrent
//! redemptions of a code with a single remaining use cannot both succeed.

use chrono::Utc;
use genselfie_core::codes::{self, CodeUsability};

use crate::models::promo_code::{CreatePromoCode, PromoCode};
use crate::DbPool;

/// Column list for promo_codes queries.
const COLUMNS: &str = "id, code, uses_remaining, max_uses, expires_at, is_active, created_at";

/// Outcome of an atomic validate-and-consume attempt.
#[derive(Debug)]
pub enum ConsumeOutcome {
    /// One use was consumed; the returned row reflects the decrement.
    Consumed(PromoCode),
    /// The code was not usable; carries the reason.
    Rejected(CodeUsability),
}

pub struct PromoCodeRepo;

impl PromoCodeRepo {
    /// Insert a new code (normalized), returning the created row.
    pub async fn create(pool: &DbPool, input: &CreatePromoCode) -> Result<PromoCode, sqlx::Error> {
        let query = format!(
            "INSERT INTO promo_codes (code, uses_remaining, max_uses, expires_at, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PromoCode>(&query)
            .bind(codes::normalize(&input.code))
            .bind(input.max_uses)
            .bind(input.max_uses)
            .bind(input.expires_at)
            .bind(Utc::now())
            .fetch_one(pool)
            .await
    }

    /// Mint a fresh single-use code (compensation path). Retries on the
    /// unlikely event of a code collision.
    pub async fn mint_single_use(pool: &DbPool) -> Result<PromoCode, sqlx::Error> {
        let mut last_err = None;
        for _ in 0..3 {
            let input = CreatePromoCode {
                code: codes::generate_code(codes::GENERATED_CODE_LEN),
                max_uses: Some(1),
                expires_at: None,
            };
            match Self::create(pool, &input).await {
                Ok(code) => return Ok(code),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.expect("at least one attempt"))
    }

    /// Find an active code row by (normalized) code value.
    pub async fn find_active(pool: &DbPool, code: &str) -> Result<Option<PromoCode>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM promo_codes WHERE code = ?1 AND is_active = 1");
        sqlx::query_as::<_, PromoCode>(&query)
            .bind(codes::normalize(code))
            .fetch_optional(pool)
            .await
    }

    /// Non-mutating usability preview: evaluates the invariant without
    /// consuming a use.
    pub async fn peek(pool: &DbPool, code: &str) -> Result<CodeUsability, sqlx::Error> {
        let row = Self::find_active(pool, code).await?;
        Ok(match row {
            Some(row) => codes::evaluate(true, row.uses_remaining, row.expires_at, Utc::now()),
            None => codes::evaluate(false, None, None, Utc::now()),
        })
    }

    /// Atomically validate and consume one use.
    ///
    /// The `WHERE` clause re-states the full usability predicate so the
    /// read and the decrement are a single statement; unlimited codes
    /// (NULL uses_remaining) pass the guard without being decremented.
    pub async fn consume(pool: &DbPool, code: &str) -> Result<ConsumeOutcome, sqlx::Error> {
        let now = Utc::now();
        let query = format!(
            "UPDATE promo_codes
             SET uses_remaining = CASE
                 WHEN uses_remaining IS NULL THEN NULL
                 ELSE uses_remaining - 1
             END
             WHERE code = ?1
               AND is_active = 1
               AND (uses_remaining IS NULL OR uses_remaining > 0)
               AND (expires_at IS NULL OR expires_at > ?2)
             RETURNING {COLUMNS}"
        );
        let consumed = sqlx::query_as::<_, PromoCode>(&query)
            .bind(codes::normalize(code))
            .bind(now)
            .fetch_optional(pool)
            .await?;

        match consumed {
            Some(row) => Ok(ConsumeOutcome::Consumed(row)),
            // Re-derive the rejection reason for the caller.
            None => Ok(ConsumeOutcome::Rejected(Self::peek(pool, code).await?)),
        }
    }

    /// List all codes, newest first (admin view).
    pub async fn list(pool: &DbPool) -> Result<Vec<PromoCode>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM promo_codes ORDER BY created_at DESC");
        sqlx::query_as::<_, PromoCode>(&query).fetch_all(pool).await
    }

    /// Deactivate a code. Returns `true` if a row was updated.
    pub async fn deactivate(pool: &DbPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE promo_codes SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
