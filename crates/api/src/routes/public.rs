//! Visitor-facing route definitions.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::public;
use crate::state::AppState;

/// Public routes mounted at `/api/v1`.
///
/// ```text
/// GET  /server-status            -> server_status
/// GET  /presets                  -> list_presets
/// POST /codes/validate           -> validate_code
/// POST /payments                 -> create_payment
/// GET  /payments/{ref}/status    -> payment_status
/// POST /generations              -> create_generation
/// GET  /generations/{id}         -> generation_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/server-status", get(public::server_status))
        .route("/presets", get(public::list_presets))
        .route("/codes/validate", post(public::validate_code))
        .route("/payments", post(public::create_payment))
        .route("/payments/{payment_ref}/status", get(public::payment_status))
        .route("/generations", post(public::create_generation))
        .route("/generations/{id}", get(public::generation_status))
}
