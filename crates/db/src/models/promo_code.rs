//! Promo / compensation codes.

use genselfie_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `promo_codes` table.
///
/// `uses_remaining = NULL` means unlimited; `expires_at = NULL` means the
/// code never expires.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PromoCode {
    pub id: DbId,
    pub code: String,
    pub uses_remaining: Option<i64>,
    pub max_uses: Option<i64>,
    pub expires_at: Option<Timestamp>,
    pub is_active: bool,
    pub created_at: Timestamp,
}

/// Input for creating a new code. The code value is normalized
/// (trimmed, uppercased) before insertion.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePromoCode {
    pub code: String,
    pub max_uses: Option<i64>,
    pub expires_at: Option<Timestamp>,
}
