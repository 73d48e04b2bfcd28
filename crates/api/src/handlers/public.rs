//! Visitor-facing handlers: server status, code validation, checkout,
//! and the generation flow itself.

use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use genselfie_core::codes::CodeUsability;
use genselfie_core::types::DbId;
use genselfie_db::models::payment::CreatePayment;
use genselfie_db::repositories::{PaymentRepo, PresetRepo, PromoCodeRepo, SettingsRepo};
use serde::{Deserialize, Serialize};

use crate::engine::admission::AdmissionRequest;
use crate::engine::{ImageSource, StartRequest};
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::sessions::PendingCheckout;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Server status
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ServerStatus {
    pub online: bool,
    pub queue_pending: usize,
    pub queue_running: usize,
    pub queue_total: usize,
}

/// GET /api/v1/server-status
///
/// Best-effort backend reachability and queue depth; an unreachable
/// backend is reported as offline, never as an error.
pub async fn server_status(State(state): State<AppState>) -> Json<ServerStatus> {
    let backend = state.backends.backend();
    let status = match backend.queue_snapshot().await {
        Ok(snapshot) => ServerStatus {
            online: true,
            queue_pending: snapshot.queue_pending.len(),
            queue_running: snapshot.queue_running.len(),
            queue_total: snapshot.len(),
        },
        Err(_) => ServerStatus {
            online: false,
            queue_pending: 0,
            queue_running: 0,
            queue_total: 0,
        },
    };
    Json(status)
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

/// GET /api/v1/presets
pub async fn list_presets(State(state): State<AppState>) -> AppResult<impl axum::response::IntoResponse> {
    let presets = PresetRepo::list_active(&state.pool).await?;
    Ok(Json(DataResponse { data: presets }))
}

// ---------------------------------------------------------------------------
// Promo code validation (non-mutating)
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ValidateCodeRequest {
    pub code: String,
}

#[derive(Serialize)]
pub struct ValidateCodeResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

/// POST /api/v1/codes/validate
///
/// Preview only; consumes nothing. A code reported valid here can still
/// be refused at generation time if it runs out in between.
pub async fn validate_code(
    State(state): State<AppState>,
    Json(input): Json<ValidateCodeRequest>,
) -> AppResult<Json<ValidateCodeResponse>> {
    let usability = PromoCodeRepo::peek(&state.pool, &input.code).await?;
    let response = match usability {
        CodeUsability::Usable => ValidateCodeResponse {
            valid: true,
            error: None,
        },
        rejected => ValidateCodeResponse {
            valid: false,
            error: Some(rejected.reason()),
        },
    };
    Ok(Json(response))
}

// ---------------------------------------------------------------------------
// Checkout
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreatePaymentRequest {
    /// `"stripe"` or `"lightning"`.
    pub method: String,
    pub preset_id: Option<DbId>,
    /// Custom prompt to fix for the post-payment generation.
    pub prompt: Option<String>,
}

#[derive(Serialize)]
pub struct CreatePaymentResponse {
    pub payment_ref: String,
    pub client_secret: String,
    /// Single-use token that carries the checkout across the redirect.
    pub session_token: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// POST /api/v1/payments
///
/// Creates the provider-side payment and a pending checkout session. The
/// amount comes from the chosen preset, falling back to the configured
/// base price.
pub async fn create_payment(
    State(state): State<AppState>,
    Json(input): Json<CreatePaymentRequest>,
) -> AppResult<Json<DataResponse<CreatePaymentResponse>>> {
    let settings = SettingsRepo::get(&state.pool).await?;
    let enabled = match input.method.as_str() {
        "stripe" => settings.stripe_enabled,
        "lightning" => settings.lightning_enabled,
        other => return Err(AppError::BadRequest(format!("Unknown payment method: {other}"))),
    };
    if !enabled {
        return Err(AppError::BadRequest(
            "This payment method is not enabled".into(),
        ));
    }
    let provider = state
        .providers
        .for_method(&input.method)
        .ok_or_else(|| AppError::BadRequest("This payment method is not configured".into()))?;

    let amount_cents = match input.preset_id {
        Some(preset_id) => PresetRepo::find_by_id(&state.pool, preset_id)
            .await?
            .filter(|p| p.is_active)
            .map(|p| p.price_cents)
            .ok_or_else(|| AppError::BadRequest("Unknown preset".into()))?,
        None => state.config.price_cents,
    };

    let created = provider.create(amount_cents, &settings.currency).await?;

    PaymentRepo::create(
        &state.pool,
        &CreatePayment {
            payment_type: input.method.clone(),
            external_id: created.payment_ref.clone(),
            amount_cents,
            currency: settings.currency.clone(),
        },
    )
    .await?;

    let session_token = state.sessions.insert(PendingCheckout {
        method: input.method.clone(),
        payment_ref: created.payment_ref.clone(),
        preset_id: input.preset_id,
        prompt: input.prompt,
    });

    tracing::info!(method = %input.method, amount_cents, "Payment created");

    Ok(Json(DataResponse {
        data: CreatePaymentResponse {
            payment_ref: created.payment_ref,
            client_secret: created.client_secret,
            session_token,
            extra: created.extra,
        },
    }))
}

#[derive(Deserialize)]
pub struct PaymentStatusQuery {
    pub method: String,
}

#[derive(Serialize)]
pub struct PaymentStatusResponse {
    pub paid: bool,
}

/// GET /api/v1/payments/{ref}/status?method=stripe
pub async fn payment_status(
    State(state): State<AppState>,
    Path(payment_ref): Path<String>,
    Query(query): Query<PaymentStatusQuery>,
) -> AppResult<Json<PaymentStatusResponse>> {
    let provider = state
        .providers
        .for_method(&query.method)
        .ok_or_else(|| AppError::BadRequest("This payment method is not configured".into()))?;
    let paid = provider.check(&payment_ref).await;
    Ok(Json(PaymentStatusResponse { paid }))
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// POST /api/v1/generations (multipart)
///
/// Fields: `method` (code|stripe|lightning), `code`, `payment_ref`,
/// `session` (token from checkout, replaces method/payment_ref/preset),
/// `preset_id`, `prompt`, and either an `image` file part or `image_url`.
pub async fn create_generation(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<impl axum::response::IntoResponse> {
    let mut method: Option<String> = None;
    let mut code: Option<String> = None;
    let mut payment_ref: Option<String> = None;
    let mut session: Option<String> = None;
    let mut preset_id: Option<DbId> = None;
    let mut prompt: Option<String> = None;
    let mut image_url: Option<String> = None;
    let mut upload: Option<(Vec<u8>, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let ext = field
                    .file_name()
                    .and_then(|f| f.rsplit('.').next())
                    .unwrap_or("png")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Unreadable image upload: {e}")))?;
                upload = Some((bytes.to_vec(), ext));
            }
            _ => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Unreadable field {name}: {e}")))?;
                if value.is_empty() {
                    continue;
                }
                match name.as_str() {
                    "method" => method = Some(value),
                    "code" => code = Some(value),
                    "payment_ref" => payment_ref = Some(value),
                    "session" => session = Some(value),
                    "preset_id" => {
                        preset_id = Some(value.parse().map_err(|_| {
                            AppError::BadRequest("preset_id must be an integer".into())
                        })?)
                    }
                    "prompt" => prompt = Some(value),
                    "image_url" => image_url = Some(value),
                    _ => {}
                }
            }
        }
    }

    // A checkout session overrides loose fields: its contents were fixed
    // before the visitor went off to pay.
    if let Some(token) = session {
        let checkout = state
            .sessions
            .take(&token)
            .ok_or_else(|| AppError::BadRequest("Unknown or expired checkout session".into()))?;
        method = Some(checkout.method);
        payment_ref = Some(checkout.payment_ref);
        preset_id = checkout.preset_id.or(preset_id);
        prompt = checkout.prompt.or(prompt);
    }

    let method = method.ok_or_else(|| AppError::BadRequest("Payment method required".into()))?;
    let source = match (upload, image_url) {
        (Some((bytes, ext)), _) => ImageSource::Upload { bytes, ext },
        (None, Some(url)) => ImageSource::Url(url),
        (None, None) => return Err(AppError::BadRequest("No input image provided".into())),
    };

    let view = state
        .orchestrator
        .start(StartRequest {
            admission: AdmissionRequest {
                method,
                code,
                payment_ref,
            },
            source,
            preset_id,
            prompt,
        })
        .await?;

    Ok(Json(DataResponse { data: view }))
}

/// GET /api/v1/generations/{id}
///
/// Idempotent status query; advances a processing row by at most one
/// completion check.
pub async fn generation_status(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl axum::response::IntoResponse> {
    let view = state.orchestrator.check_status(id).await?;
    Ok(Json(DataResponse { data: view }))
}
