//! Repository for the singleton `settings` row.

use chrono::Utc;

use crate::models::settings::{Settings, UpdateSettings};
use crate::DbPool;

const COLUMNS: &str = "id, app_name, currency, stripe_enabled, lightning_enabled, \
    codes_enabled, failsafe_enabled, workflow_json, subject_node_id, input_node_id, \
    updated_at";

pub struct SettingsRepo;

impl SettingsRepo {
    /// Fetch the settings row (seeded by the initial migration).
    pub async fn get(pool: &DbPool) -> Result<Settings, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM settings WHERE id = 1");
        sqlx::query_as::<_, Settings>(&query).fetch_one(pool).await
    }

    /// Patch the settings row; `None` fields keep their current value.
    pub async fn update(pool: &DbPool, patch: &UpdateSettings) -> Result<Settings, sqlx::Error> {
        let query = format!(
            "UPDATE settings SET
                app_name = COALESCE(?1, app_name),
                currency = COALESCE(?2, currency),
                stripe_enabled = COALESCE(?3, stripe_enabled),
                lightning_enabled = COALESCE(?4, lightning_enabled),
                codes_enabled = COALESCE(?5, codes_enabled),
                failsafe_enabled = COALESCE(?6, failsafe_enabled),
                workflow_json = COALESCE(?7, workflow_json),
                subject_node_id = COALESCE(?8, subject_node_id),
                input_node_id = COALESCE(?9, input_node_id),
                updated_at = ?10
             WHERE id = 1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Settings>(&query)
            .bind(&patch.app_name)
            .bind(&patch.currency)
            .bind(patch.stripe_enabled)
            .bind(patch.lightning_enabled)
            .bind(patch.codes_enabled)
            .bind(patch.failsafe_enabled)
            .bind(&patch.workflow_json)
            .bind(&patch.subject_node_id)
            .bind(&patch.input_node_id)
            .bind(Utc::now())
            .fetch_one(pool)
            .await
    }
}
