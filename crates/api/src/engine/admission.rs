//! Admission control: nobody reaches the generation pipeline without a
//! consumed promo code or a verified payment.
//!
//! Code consumption is a single atomic step in the repository; there is
//! no separate validate-then-consume window. Refusals surface as
//! [`CoreError::AuthorizationDenied`] before any ledger row exists.

use std::sync::Arc;

use genselfie_core::codes::CodeUsability;
use genselfie_core::error::CoreError;
use genselfie_db::models::generation::{AUTH_METHOD_CODE, AUTH_METHOD_LIGHTNING, AUTH_METHOD_STRIPE};
use genselfie_db::models::settings::Settings;
use genselfie_db::repositories::{ConsumeOutcome, PromoCodeRepo};
use genselfie_db::DbPool;
use genselfie_payments::PaymentProvider;

use crate::error::AppError;

/// The configured payment providers, looked up by method name.
#[derive(Default)]
pub struct PaymentProviders {
    pub stripe: Option<Arc<dyn PaymentProvider>>,
    pub lightning: Option<Arc<dyn PaymentProvider>>,
}

impl PaymentProviders {
    pub fn for_method(&self, method: &str) -> Option<&Arc<dyn PaymentProvider>> {
        match method {
            AUTH_METHOD_STRIPE => self.stripe.as_ref(),
            AUTH_METHOD_LIGHTNING => self.lightning.as_ref(),
            _ => None,
        }
    }
}

/// What the visitor presented at the door.
#[derive(Debug, Clone)]
pub struct AdmissionRequest {
    /// `"code"`, `"stripe"`, or `"lightning"`.
    pub method: String,
    pub code: Option<String>,
    pub payment_ref: Option<String>,
}

/// A granted admission: the method plus the consumed code or verified
/// payment reference, as recorded on the ledger row.
#[derive(Debug, Clone)]
pub struct Admission {
    pub method: String,
    pub reference: Option<String>,
}

pub struct AdmissionGate;

impl AdmissionGate {
    /// Authorize or refuse, consuming the code on success.
    ///
    /// Payment verification is boolean: an unverifiable payment is an
    /// unpaid payment.
    pub async fn authorize(
        pool: &DbPool,
        settings: &Settings,
        providers: &PaymentProviders,
        request: &AdmissionRequest,
    ) -> Result<Admission, AppError> {
        match request.method.as_str() {
            AUTH_METHOD_CODE => {
                if !settings.codes_enabled {
                    return Err(denied("Promo codes are not enabled"));
                }
                let code = request
                    .code
                    .as_deref()
                    .filter(|c| !c.trim().is_empty())
                    .ok_or_else(|| denied("Promo code required"))?;

                match PromoCodeRepo::consume(pool, code).await? {
                    ConsumeOutcome::Consumed(row) => Ok(Admission {
                        method: AUTH_METHOD_CODE.into(),
                        reference: Some(row.code),
                    }),
                    ConsumeOutcome::Rejected(usability) => Err(denied(rejection_reason(usability))),
                }
            }

            method @ (AUTH_METHOD_STRIPE | AUTH_METHOD_LIGHTNING) => {
                let enabled = match method {
                    AUTH_METHOD_STRIPE => settings.stripe_enabled,
                    _ => settings.lightning_enabled,
                };
                if !enabled {
                    return Err(denied("This payment method is not enabled"));
                }
                let payment_ref = request
                    .payment_ref
                    .as_deref()
                    .filter(|r| !r.is_empty())
                    .ok_or_else(|| denied("Payment reference required"))?;
                let provider = providers
                    .for_method(method)
                    .ok_or_else(|| denied("This payment method is not configured"))?;

                if provider.check(payment_ref).await {
                    Ok(Admission {
                        method: method.into(),
                        reference: Some(payment_ref.to_string()),
                    })
                } else {
                    Err(denied("Payment not completed"))
                }
            }

            other => Err(AppError::BadRequest(format!(
                "Unknown payment method: {other}"
            ))),
        }
    }
}

fn denied(msg: &str) -> AppError {
    AppError::Core(CoreError::AuthorizationDenied(msg.to_string()))
}

fn rejection_reason(usability: CodeUsability) -> &'static str {
    match usability {
        // Lost a race between the failed consume and the re-derivation.
        CodeUsability::Usable => "Promo code could not be redeemed",
        other => other.reason(),
    }
}
