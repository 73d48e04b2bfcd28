//! Lightning invoices via an LNbits instance (`/api/v1/payments`,
//! `X-Api-Key` auth).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::{CreatedPayment, PaymentError, PaymentProvider};

const CREATE_TIMEOUT: Duration = Duration::from_secs(30);
const CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Placeholder USD->sat rate; the real rate belongs in configuration or a
/// price feed. TODO: fetch the live exchange rate instead of a constant.
const SATS_PER_CENT: i64 = 25;

/// LNbits Lightning invoices.
pub struct LnbitsProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct CreatedInvoice {
    payment_request: String,
    checking_id: String,
}

#[derive(Debug, Deserialize)]
struct InvoiceStatus {
    #[serde(default)]
    paid: bool,
}

/// Convert an amount in cents to satoshis, clamped to at least 1 sat.
/// Non-USD amounts are assumed to already be sats.
pub fn cents_to_sats(amount_cents: i64, currency: &str) -> i64 {
    let sats = if currency.eq_ignore_ascii_case("USD") {
        amount_cents * SATS_PER_CENT
    } else {
        amount_cents
    };
    sats.max(1)
}

impl LnbitsProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl PaymentProvider for LnbitsProvider {
    fn method(&self) -> &'static str {
        "lightning"
    }

    async fn create(
        &self,
        amount_cents: i64,
        currency: &str,
    ) -> Result<CreatedPayment, PaymentError> {
        let amount_sats = cents_to_sats(amount_cents, currency);
        let payload = json!({
            "out": false,
            "amount": amount_sats,
            "memo": "Selfie generation",
            "unit": "sat",
        });

        let response = self
            .client
            .post(format!("{}/api/v1/payments", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .json(&payload)
            .timeout(CREATE_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let invoice: CreatedInvoice = response.json().await?;

        let mut extra = serde_json::Map::new();
        extra.insert("amount_sats".into(), serde_json::Value::from(amount_sats));

        Ok(CreatedPayment {
            payment_ref: invoice.checking_id,
            client_secret: invoice.payment_request,
            extra,
        })
    }

    async fn check(&self, payment_ref: &str) -> bool {
        let result = self
            .client
            .get(format!("{}/api/v1/payments/{}", self.base_url, payment_ref))
            .header("X-Api-Key", &self.api_key)
            .timeout(CHECK_TIMEOUT)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        match result {
            Ok(response) => response
                .json::<InvoiceStatus>()
                .await
                .map(|s| s.paid)
                .unwrap_or(false),
            Err(e) => {
                tracing::warn!(payment_ref, error = %e, "Lightning status check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usd_cents_convert_to_sats() {
        assert_eq!(cents_to_sats(100, "USD"), 2500);
        assert_eq!(cents_to_sats(100, "usd"), 2500);
    }

    #[test]
    fn non_usd_amounts_pass_through_as_sats() {
        assert_eq!(cents_to_sats(500, "SAT"), 500);
    }

    #[test]
    fn zero_amount_clamps_to_one_sat() {
        assert_eq!(cents_to_sats(0, "USD"), 1);
        assert_eq!(cents_to_sats(0, "SAT"), 1);
    }
}
