//! Stripe PaymentIntents over the plain REST API (form-encoded, secret key
//! as HTTP basic auth user).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::{CreatedPayment, PaymentError, PaymentProvider};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Stripe card payments via PaymentIntents.
pub struct StripeProvider {
    client: reqwest::Client,
    secret_key: String,
    /// Returned to the frontend alongside the client secret.
    publishable_key: String,
}

#[derive(Debug, Deserialize)]
struct PaymentIntent {
    id: String,
    status: String,
    client_secret: Option<String>,
}

impl StripeProvider {
    pub fn new(secret_key: impl Into<String>, publishable_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: secret_key.into(),
            publishable_key: publishable_key.into(),
        }
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    fn method(&self) -> &'static str {
        "stripe"
    }

    async fn create(
        &self,
        amount_cents: i64,
        currency: &str,
    ) -> Result<CreatedPayment, PaymentError> {
        let params = [
            ("amount", amount_cents.to_string()),
            ("currency", currency.to_lowercase()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];

        let response = self
            .client
            .post(format!("{STRIPE_API_BASE}/payment_intents"))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&params)
            .timeout(REQUEST_TIMEOUT)
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

        let intent: PaymentIntent = response.json().await?;
        let client_secret = intent
            .client_secret
            .ok_or(PaymentError::Malformed("client_secret missing"))?;

        let mut extra = serde_json::Map::new();
        extra.insert(
            "publishable_key".into(),
            serde_json::Value::String(self.publishable_key.clone()),
        );

        Ok(CreatedPayment {
            payment_ref: intent.id,
            client_secret,
            extra,
        })
    }

    async fn check(&self, payment_ref: &str) -> bool {
        let result = self
            .client
            .get(format!("{STRIPE_API_BASE}/payment_intents/{payment_ref}"))
            .basic_auth(&self.secret_key, None::<&str>)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        match result {
            Ok(response) => match response.json::<PaymentIntent>().await {
                Ok(intent) => intent.status == "succeeded",
                Err(e) => {
                    tracing::warn!(payment_ref, error = %e, "Malformed PaymentIntent response");
                    false
                }
            },
            Err(e) => {
                tracing::warn!(payment_ref, error = %e, "Stripe status check failed");
                false
            }
        }
    }
}
