//! Generation presets: subject image + output dimensions + prompt + price.

use genselfie_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `presets` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Preset {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub influencer_image_id: DbId,
    pub width: i64,
    pub height: i64,
    pub prompt: Option<String>,
    pub price_cents: i64,
    pub allow_prompt_edit: bool,
    pub is_active: bool,
    pub sort_order: i64,
    pub created_at: Timestamp,
}

/// Input for creating a new preset.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePreset {
    pub name: String,
    pub description: Option<String>,
    pub influencer_image_id: DbId,
    #[serde(default = "default_dimension")]
    pub width: i64,
    #[serde(default = "default_dimension")]
    pub height: i64,
    pub prompt: Option<String>,
    #[serde(default = "default_price")]
    pub price_cents: i64,
    #[serde(default)]
    pub allow_prompt_edit: bool,
    #[serde(default)]
    pub sort_order: i64,
}

fn default_dimension() -> i64 {
    1024
}

fn default_price() -> i64 {
    500
}
