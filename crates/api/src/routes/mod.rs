pub mod admin;
pub mod health;
pub mod public;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /server-status                    backend reachability + queue depth
/// /presets                          active presets (storefront)
/// /codes/validate                   non-mutating code preview
/// /payments                         create checkout
/// /payments/{ref}/status            payment settled?
/// /generations                      start a generation (multipart)
/// /generations/{id}                 status / result
///
/// /admin/codes                      list, create          (admin token)
/// /admin/codes/{id}                 deactivate
/// /admin/presets                    list, create
/// /admin/presets/{id}               deactivate
/// /admin/images                     list, upload
/// /admin/images/{id}                delete
/// /admin/generations                recent ledger rows
/// /admin/settings                   get, update
/// /admin/backend-url                atomic replace
/// /admin/examples/generate-all      batch example flow
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(public::router())
        .nest("/admin", admin::router())
}
