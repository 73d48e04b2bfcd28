//! Application settings: a single-row table holding the payment toggles,
//! failsafe switch, and the stored workflow definition.

use genselfie_core::types::Timestamp;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The singleton `settings` row (id = 1).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Settings {
    pub id: i64,
    pub app_name: String,
    pub currency: String,
    pub stripe_enabled: bool,
    pub lightning_enabled: bool,
    pub codes_enabled: bool,
    pub failsafe_enabled: bool,
    pub workflow_json: Option<String>,
    pub subject_node_id: Option<String>,
    pub input_node_id: Option<String>,
    pub updated_at: Timestamp,
}

/// Patch for the settings row; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSettings {
    pub app_name: Option<String>,
    pub currency: Option<String>,
    pub stripe_enabled: Option<bool>,
    pub lightning_enabled: Option<bool>,
    pub codes_enabled: Option<bool>,
    pub failsafe_enabled: Option<bool>,
    pub workflow_json: Option<String>,
    pub subject_node_id: Option<String>,
    pub input_node_id: Option<String>,
}
