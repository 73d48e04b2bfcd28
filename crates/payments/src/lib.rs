//! Payment capability providers (Stripe card payments, LNbits Lightning
//! invoices) behind a single [`PaymentProvider`] trait.
//!
//! Verification is deliberately lossy: [`PaymentProvider::check`] returns a
//! plain `bool`, and an unreachable provider reads the same as an unpaid
//! invoice. Admission must never be granted on ambiguity.

pub mod lnbits;
pub mod stripe;

use async_trait::async_trait;

pub use lnbits::LnbitsProvider;
pub use stripe::StripeProvider;

/// Errors from payment creation.
///
/// Only creation fails loudly; status checks absorb transport errors into
/// "not paid".
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// The provider is not configured (missing key or URL).
    #[error("Payment provider not configured: {0}")]
    NotConfigured(&'static str),

    /// The HTTP request itself failed.
    #[error("Payment request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-success status.
    #[error("Payment provider error ({status}): {body}")]
    Provider {
        status: u16,
        body: String,
    },

    /// The provider response was missing an expected field.
    #[error("Malformed provider response: {0}")]
    Malformed(&'static str),
}

/// A freshly created payment, in whatever shape the frontend needs to
/// complete it.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CreatedPayment {
    /// Provider-side identifier used for later status checks.
    pub payment_ref: String,
    /// Secret the frontend uses to complete the payment (Stripe client
    /// secret or the BOLT11 payment request).
    pub client_secret: String,
    /// Extra provider-specific fields (publishable key, sat amount).
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A payment backend able to create a charge and verify it settled.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Short method name stored on ledger rows (`"stripe"`, `"lightning"`).
    fn method(&self) -> &'static str;

    /// Create a payment for `amount_cents` of `currency`.
    async fn create(&self, amount_cents: i64, currency: &str) -> Result<CreatedPayment, PaymentError>;

    /// Whether the payment identified by `payment_ref` has settled.
    ///
    /// `false` covers unpaid, unknown, and unverifiable alike.
    async fn check(&self, payment_ref: &str) -> bool;
}
