//! Payment audit records for Stripe and Lightning checkouts.

use genselfie_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `payments` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payment {
    pub id: DbId,
    pub payment_type: String,
    /// Stripe PaymentIntent id or LNbits checking id.
    pub external_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    pub generation_id: Option<DbId>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

/// Input for recording a newly created payment.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePayment {
    pub payment_type: String,
    pub external_id: String,
    pub amount_cents: i64,
    pub currency: String,
}
