//! Repository for the `generations` ledger table.
//!
//! Status transitions are forward-only and enforced in SQL: every
//! mutation guards on the expected current status, so a repeated or
//! late write against a terminal row affects zero rows and the caller
//! can tell (`rows_affected() > 0`). Rows are never deleted.

use chrono::Utc;
use genselfie_core::types::{DbId, Timestamp};

use crate::models::generation::{CreateGeneration, Generation};
use crate::DbPool;

/// Column list for generations queries.
const COLUMNS: &str = "id, source_image_ref, preset_id, authorization_method, \
    authorization_ref, status, backend_job_id, result_ref, compensation_code, \
    error, created_at, completed_at";

pub struct GenerationRepo;

impl GenerationRepo {
    /// Insert a new ledger row in `pending`, returning it.
    pub async fn create(pool: &DbPool, input: &CreateGeneration) -> Result<Generation, sqlx::Error> {
        let query = format!(
            "INSERT INTO generations
                (source_image_ref, preset_id, authorization_method,
                 authorization_ref, status, created_at)
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(&input.source_image_ref)
            .bind(input.preset_id)
            .bind(&input.authorization_method)
            .bind(&input.authorization_ref)
            .bind(Utc::now())
            .fetch_one(pool)
            .await
    }

    /// Find a ledger row by its primary key.
    pub async fn find_by_id(pool: &DbPool, id: DbId) -> Result<Option<Generation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generations WHERE id = ?1");
        sqlx::query_as::<_, Generation>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// `pending -> processing`, recording the backend job id.
    /// Returns `true` if the transition happened.
    pub async fn mark_processing(
        pool: &DbPool,
        id: DbId,
        backend_job_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations SET status = 'processing', backend_job_id = ?1
             WHERE id = ?2 AND status = 'pending'",
        )
        .bind(backend_job_id)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// `processing -> completed`, recording the durable result location.
    /// Returns `true` if the transition happened.
    pub async fn mark_completed(
        pool: &DbPool,
        id: DbId,
        result_ref: &str,
        completed_at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations SET status = 'completed', result_ref = ?1, completed_at = ?2
             WHERE id = ?3 AND status = 'processing'",
        )
        .bind(result_ref)
        .bind(completed_at)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// `pending | processing -> failed`, recording a sanitized error.
    /// Returns `true` if the transition happened (false means the row was
    /// already terminal and nothing changed).
    pub async fn mark_failed(pool: &DbPool, id: DbId, error: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations SET status = 'failed', error = ?1, completed_at = ?2
             WHERE id = ?3 AND status IN ('pending', 'processing')",
        )
        .bind(error)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a compensation code: only on `failed` rows, only once.
    /// Returns `true` if the code was recorded.
    pub async fn set_compensation_code(
        pool: &DbPool,
        id: DbId,
        code: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations SET compensation_code = ?1
             WHERE id = ?2 AND status = 'failed' AND compensation_code IS NULL",
        )
        .bind(code)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Most recent ledger rows (admin view).
    pub async fn list_recent(pool: &DbPool, limit: i64) -> Result<Vec<Generation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generations ORDER BY created_at DESC, id DESC LIMIT ?1"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
