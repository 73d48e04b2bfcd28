//! Reference images of the subject used for generation.

use genselfie_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `influencer_images` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct InfluencerImage {
    pub id: DbId,
    pub filename: String,
    pub original_name: String,
    pub is_primary: bool,
    pub created_at: Timestamp,
}

/// Input for registering a new reference image.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateInfluencerImage {
    pub filename: String,
    pub original_name: String,
    #[serde(default)]
    pub is_primary: bool,
}
