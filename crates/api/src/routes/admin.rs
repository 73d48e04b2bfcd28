//! Admin route definitions, mounted at `/api/v1/admin`.
//!
//! Authentication lives in the handlers via the `RequireAdmin`
//! extractor, so an unauthenticated request gets a uniform 401.

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// ```text
/// GET    /codes                     -> list_codes
/// POST   /codes                     -> create_code
/// DELETE /codes/{id}                -> deactivate_code
/// GET    /presets                   -> list_presets
/// POST   /presets                   -> create_preset
/// DELETE /presets/{id}              -> deactivate_preset
/// GET    /images                    -> list_images
/// POST   /images                    -> upload_image
/// DELETE /images/{id}               -> delete_image
/// GET    /generations               -> list_generations
/// GET    /settings                  -> get_settings
/// PUT    /settings                  -> update_settings
/// PUT    /backend-url               -> update_backend_url
/// POST   /examples/generate-all     -> generate_examples
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/codes", get(admin::list_codes).post(admin::create_code))
        .route("/codes/{id}", delete(admin::deactivate_code))
        .route(
            "/presets",
            get(admin::list_presets).post(admin::create_preset),
        )
        .route("/presets/{id}", delete(admin::deactivate_preset))
        .route("/images", get(admin::list_images).post(admin::upload_image))
        .route("/images/{id}", delete(admin::delete_image))
        .route("/generations", get(admin::list_generations))
        .route(
            "/settings",
            get(admin::get_settings).put(admin::update_settings),
        )
        .route("/backend-url", put(admin::update_backend_url))
        .route("/examples/generate-all", post(admin::generate_examples))
}
