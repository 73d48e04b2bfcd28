//! Repository for the `influencer_images` table.

use chrono::Utc;
use genselfie_core::types::DbId;

use crate::models::influencer_image::{CreateInfluencerImage, InfluencerImage};
use crate::DbPool;

const COLUMNS: &str = "id, filename, original_name, is_primary, created_at";

pub struct InfluencerImageRepo;

impl InfluencerImageRepo {
    /// Insert a new reference image. Setting `is_primary` clears the flag
    /// on every other row in the same transaction.
    pub async fn create(
        pool: &DbPool,
        input: &CreateInfluencerImage,
    ) -> Result<InfluencerImage, sqlx::Error> {
        let mut tx = pool.begin().await?;
        if input.is_primary {
            sqlx::query("UPDATE influencer_images SET is_primary = 0 WHERE is_primary = 1")
                .execute(&mut *tx)
                .await?;
        }
        let query = format!(
            "INSERT INTO influencer_images (filename, original_name, is_primary, created_at)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, InfluencerImage>(&query)
            .bind(&input.filename)
            .bind(&input.original_name)
            .bind(input.is_primary)
            .bind(Utc::now())
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row)
    }

    pub async fn find_by_id(
        pool: &DbPool,
        id: DbId,
    ) -> Result<Option<InfluencerImage>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM influencer_images WHERE id = ?1");
        sqlx::query_as::<_, InfluencerImage>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The primary reference image, falling back to the oldest row.
    pub async fn find_primary(pool: &DbPool) -> Result<Option<InfluencerImage>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM influencer_images
             ORDER BY is_primary DESC, created_at ASC
             LIMIT 1"
        );
        sqlx::query_as::<_, InfluencerImage>(&query)
            .fetch_optional(pool)
            .await
    }

    /// All reference images, primary first.
    pub async fn list(pool: &DbPool) -> Result<Vec<InfluencerImage>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM influencer_images ORDER BY is_primary DESC, created_at DESC"
        );
        sqlx::query_as::<_, InfluencerImage>(&query)
            .fetch_all(pool)
            .await
    }

    /// Delete a reference image row. Returns `true` if a row was removed.
    pub async fn delete(pool: &DbPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM influencer_images WHERE id = ?1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
