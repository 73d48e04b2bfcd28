//! Repository for the `presets` table.

use chrono::Utc;
use genselfie_core::types::DbId;

use crate::models::preset::{CreatePreset, Preset};
use crate::DbPool;

const COLUMNS: &str = "id, name, description, influencer_image_id, width, height, \
    prompt, price_cents, allow_prompt_edit, is_active, sort_order, created_at";

pub struct PresetRepo;

impl PresetRepo {
    pub async fn create(pool: &DbPool, input: &CreatePreset) -> Result<Preset, sqlx::Error> {
        let query = format!(
            "INSERT INTO presets
                (name, description, influencer_image_id, width, height, prompt,
                 price_cents, allow_prompt_edit, is_active, sort_order, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?10)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Preset>(&query)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.influencer_image_id)
            .bind(input.width)
            .bind(input.height)
            .bind(&input.prompt)
            .bind(input.price_cents)
            .bind(input.allow_prompt_edit)
            .bind(input.sort_order)
            .bind(Utc::now())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &DbPool, id: DbId) -> Result<Option<Preset>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM presets WHERE id = ?1");
        sqlx::query_as::<_, Preset>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Active presets in display order (storefront listing).
    pub async fn list_active(pool: &DbPool) -> Result<Vec<Preset>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM presets WHERE is_active = 1
             ORDER BY sort_order ASC, created_at ASC"
        );
        sqlx::query_as::<_, Preset>(&query).fetch_all(pool).await
    }

    /// Deactivate a preset. Returns `true` if a row was updated.
    pub async fn deactivate(pool: &DbPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE presets SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
