//! Admin handlers: codes, presets, reference images, settings, the
//! backend URL, the ledger view, and the example batch flow.
//!
//! Every handler takes [`RequireAdmin`] first; the bearer token is the
//! whole authentication story here.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use genselfie_core::codes;
use genselfie_core::error::CoreError;
use genselfie_core::preset::{validate_dimensions, validate_name};
use genselfie_core::types::DbId;
use genselfie_db::models::influencer_image::CreateInfluencerImage;
use genselfie_db::models::preset::CreatePreset;
use genselfie_db::models::promo_code::CreatePromoCode;
use genselfie_db::models::settings::UpdateSettings;
use genselfie_db::repositories::{
    GenerationRepo, InfluencerImageRepo, PresetRepo, PromoCodeRepo, SettingsRepo,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::admin::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Promo codes
// ---------------------------------------------------------------------------

/// GET /api/v1/admin/codes
pub async fn list_codes(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let codes = PromoCodeRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: codes }))
}

#[derive(Deserialize)]
pub struct CreateCodeRequest {
    /// Explicit code value; a random one is generated when omitted.
    #[serde(default)]
    pub code: Option<String>,
    pub max_uses: Option<i64>,
    pub expires_at: Option<genselfie_core::types::Timestamp>,
}

/// POST /api/v1/admin/codes
pub async fn create_code(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<CreateCodeRequest>,
) -> AppResult<impl IntoResponse> {
    let code_value = match input.code.map(|c| codes::normalize(&c)) {
        Some(c) if !c.is_empty() => c,
        _ => codes::generate_code(codes::GENERATED_CODE_LEN),
    };
    let created = PromoCodeRepo::create(
        &state.pool,
        &CreatePromoCode {
            code: code_value,
            max_uses: input.max_uses,
            expires_at: input.expires_at,
        },
    )
    .await?;

    tracing::info!(code_id = created.id, "Promo code created");
    Ok(Json(DataResponse { data: created }))
}

/// DELETE /api/v1/admin/codes/{id}
///
/// Deactivates rather than deletes, so redeemed uses stay auditable.
pub async fn deactivate_code(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    if !PromoCodeRepo::deactivate(&state.pool, id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "promo_code",
            id,
        }));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

/// GET /api/v1/admin/presets
pub async fn list_presets(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let presets = PresetRepo::list_active(&state.pool).await?;
    Ok(Json(DataResponse { data: presets }))
}

/// POST /api/v1/admin/presets
pub async fn create_preset(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<CreatePreset>,
) -> AppResult<impl IntoResponse> {
    validate_name(&input.name)?;
    let width = u32::try_from(input.width)
        .map_err(|_| CoreError::Validation("Preset dimensions must be positive".into()))?;
    let height = u32::try_from(input.height)
        .map_err(|_| CoreError::Validation("Preset dimensions must be positive".into()))?;
    validate_dimensions(width, height)?;
    InfluencerImageRepo::find_by_id(&state.pool, input.influencer_image_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "influencer_image",
            id: input.influencer_image_id,
        })?;

    let preset = PresetRepo::create(&state.pool, &input).await?;
    tracing::info!(preset_id = preset.id, name = %preset.name, "Preset created");
    Ok(Json(DataResponse { data: preset }))
}

/// DELETE /api/v1/admin/presets/{id}
pub async fn deactivate_preset(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    if !PresetRepo::deactivate(&state.pool, id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "preset",
            id,
        }));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Reference images
// ---------------------------------------------------------------------------

/// GET /api/v1/admin/images
pub async fn list_images(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let images = InfluencerImageRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: images }))
}

/// POST /api/v1/admin/images (multipart: `file`, optional `is_primary`)
pub async fn upload_image(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut file: Option<(Vec<u8>, String)> = None;
    let mut is_primary = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                let original = field.file_name().unwrap_or("upload.png").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Unreadable file upload: {e}")))?;
                file = Some((bytes.to_vec(), original));
            }
            "is_primary" => {
                let value = field.text().await.unwrap_or_default();
                is_primary = matches!(value.as_str(), "true" | "1" | "on");
            }
            _ => {}
        }
    }

    let (bytes, original_name) =
        file.ok_or_else(|| AppError::BadRequest("No file provided".into()))?;
    let ext = original_name.rsplit('.').next().unwrap_or("png");
    let filename = format!("influencer_{}.{ext}", uuid::Uuid::new_v4().simple());

    let dir = state.orchestrator.uploads_dir();
    tokio::fs::create_dir_all(&dir).await?;
    tokio::fs::write(dir.join(&filename), &bytes).await?;

    let image = InfluencerImageRepo::create(
        &state.pool,
        &CreateInfluencerImage {
            filename,
            original_name,
            is_primary,
        },
    )
    .await?;

    tracing::info!(image_id = image.id, is_primary, "Reference image uploaded");
    Ok(Json(DataResponse { data: image }))
}

/// DELETE /api/v1/admin/images/{id}
pub async fn delete_image(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let Some(image) = InfluencerImageRepo::find_by_id(&state.pool, id).await? else {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "influencer_image",
            id,
        }));
    };
    InfluencerImageRepo::delete(&state.pool, id).await?;
    // The row is gone either way; a missing file is not an error.
    let _ = tokio::fs::remove_file(state.orchestrator.uploads_dir().join(&image.filename)).await;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// GET /api/v1/admin/generations
pub async fn list_generations(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let rows = GenerationRepo::list_recent(&state.pool, 50).await?;
    Ok(Json(DataResponse { data: rows }))
}

// ---------------------------------------------------------------------------
// Settings and backend URL
// ---------------------------------------------------------------------------

/// GET /api/v1/admin/settings
pub async fn get_settings(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let settings = SettingsRepo::get(&state.pool).await?;
    Ok(Json(DataResponse { data: settings }))
}

/// PUT /api/v1/admin/settings
pub async fn update_settings(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Json(patch): Json<UpdateSettings>,
) -> AppResult<impl IntoResponse> {
    if let Some(ref workflow_json) = patch.workflow_json {
        // Reject broken templates at the door instead of at job time.
        genselfie_core::workflow::WorkflowTemplate::parse(workflow_json)?;
    }
    let settings = SettingsRepo::update(&state.pool, &patch).await?;
    tracing::info!("Settings updated");
    Ok(Json(DataResponse { data: settings }))
}

#[derive(Deserialize)]
pub struct UpdateBackendUrlRequest {
    pub url: String,
}

#[derive(Serialize)]
pub struct BackendUrlResponse {
    pub url: String,
}

/// PUT /api/v1/admin/backend-url
///
/// Atomic replace; in-flight jobs keep the URL they started with.
pub async fn update_backend_url(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<UpdateBackendUrlRequest>,
) -> AppResult<impl IntoResponse> {
    if input.url.trim().is_empty() {
        return Err(AppError::BadRequest("Backend URL must not be empty".into()));
    }
    state.backend_url.replace(input.url);
    let url = state.backend_url.snapshot().as_str().to_string();
    tracing::info!(%url, "Backend URL updated");
    Ok(Json(DataResponse {
        data: BackendUrlResponse { url },
    }))
}

// ---------------------------------------------------------------------------
// Example batch flow
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct GenerateExamplesResponse {
    pub succeeded: usize,
    pub attempted: usize,
}

/// POST /api/v1/admin/examples/generate-all
///
/// Runs every example input through the full pipeline, blocking until
/// each resolves or exhausts its poll budget.
pub async fn generate_examples(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let (succeeded, attempted) = state.orchestrator.generate_examples().await?;
    tracing::info!(succeeded, attempted, "Example batch finished");
    Ok(Json(DataResponse {
        data: GenerateExamplesResponse {
            succeeded,
            attempted,
        },
    }))
}
