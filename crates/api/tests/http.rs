//! HTTP-level integration tests: health, middleware behaviour, admin
//! authentication, and the public/admin JSON surfaces.

mod common;

use std::sync::Arc;

use axum::http::{Method, StatusCode};

use genselfie_api::engine::PaymentProviders;
use genselfie_db::models::settings::UpdateSettings;

use common::{
    body_json, build_test_app, get, get_admin, post_json, queue_with, seed_settings,
    send_json_admin, test_env, FakeBackend, ADMIN_TOKEN,
};

async fn plain_env() -> common::TestEnv {
    let env = test_env(FakeBackend::submitting("job-1"), PaymentProviders::default()).await;
    seed_settings(&env.pool, UpdateSettings::default()).await;
    env
}

// ---------------------------------------------------------------------------
// Health and middleware
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_ok_with_json() {
    let env = plain_env().await;
    let app = build_test_app(&env, Arc::new(PaymentProviders::default()));

    let response = get(app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["db_healthy"], true);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let env = plain_env().await;
    let app = build_test_app(&env, Arc::new(PaymentProviders::default()));

    let response = get(app, "/this-route-does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let env = plain_env().await;
    let app = build_test_app(&env, Arc::new(PaymentProviders::default()));

    let response = get(app, "/health").await;
    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("x-request-id header")
        .to_str()
        .unwrap();
    assert_eq!(request_id.len(), 36, "x-request-id should be a UUID string");
}

// ---------------------------------------------------------------------------
// Public surface
// ---------------------------------------------------------------------------

#[tokio::test]
async fn server_status_reports_queue_depth() {
    let env = plain_env().await;
    env.backend.script_queue(vec![Ok(queue_with("job-9"))]);
    let app = build_test_app(&env, Arc::new(PaymentProviders::default()));

    let response = get(app, "/api/v1/server-status").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["online"], true);
    assert_eq!(json["queue_running"], 1);
    assert_eq!(json["queue_total"], 1);
}

#[tokio::test]
async fn server_status_reports_offline_on_backend_error() {
    let env = plain_env().await;
    env.backend.script_queue(vec![Err(500)]);
    let app = build_test_app(&env, Arc::new(PaymentProviders::default()));

    let response = get(app, "/api/v1/server-status").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["online"], false);
}

#[tokio::test]
async fn unknown_code_validates_as_invalid() {
    let env = plain_env().await;
    let app = build_test_app(&env, Arc::new(PaymentProviders::default()));

    let response = post_json(
        app,
        "/api/v1/codes/validate",
        serde_json::json!({ "code": "NO-SUCH-CODE" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["valid"], false);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn payment_creation_without_provider_is_rejected() {
    let env = plain_env().await;
    seed_settings(
        &env.pool,
        UpdateSettings {
            stripe_enabled: Some(true),
            ..Default::default()
        },
    )
    .await;
    let app = build_test_app(&env, Arc::new(PaymentProviders::default()));

    let response = post_json(
        app,
        "/api/v1/payments",
        serde_json::json!({ "method": "stripe" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn generation_status_of_unknown_row_is_404() {
    let env = plain_env().await;
    let app = build_test_app(&env, Arc::new(PaymentProviders::default()));

    let response = get(app, "/api/v1/generations/424242").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Admin authentication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn admin_route_without_token_is_401() {
    let env = plain_env().await;
    let app = build_test_app(&env, Arc::new(PaymentProviders::default()));

    let response = get(app, "/api/v1/admin/codes").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_route_with_wrong_token_is_401() {
    let env = plain_env().await;
    let app = build_test_app(&env, Arc::new(PaymentProviders::default()));

    let response = get_admin(app, "/api/v1/admin/codes", "not-the-right-token-at-all").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_route_with_token_succeeds() {
    let env = plain_env().await;
    let app = build_test_app(&env, Arc::new(PaymentProviders::default()));

    let response = get_admin(app, "/api/v1/admin/codes", ADMIN_TOKEN).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json["data"].is_array());
}

// ---------------------------------------------------------------------------
// Admin surface
// ---------------------------------------------------------------------------

#[tokio::test]
async fn created_code_validates_on_the_public_surface() {
    let env = plain_env().await;
    seed_settings(
        &env.pool,
        UpdateSettings {
            codes_enabled: Some(true),
            ..Default::default()
        },
    )
    .await;
    let app = build_test_app(&env, Arc::new(PaymentProviders::default()));

    let response = send_json_admin(
        app.clone(),
        Method::POST,
        "/api/v1/admin/codes",
        ADMIN_TOKEN,
        serde_json::json!({ "code": "WELCOME", "max_uses": 5 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let created = body_json(response).await;
    assert_eq!(created["data"]["code"], "WELCOME");
    assert_eq!(created["data"]["uses_remaining"], 5);

    let response = post_json(
        app,
        "/api/v1/codes/validate",
        serde_json::json!({ "code": "WELCOME" }),
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["valid"], true);
}

#[tokio::test]
async fn code_creation_without_value_generates_one() {
    let env = plain_env().await;
    let app = build_test_app(&env, Arc::new(PaymentProviders::default()));

    let response = send_json_admin(
        app,
        Method::POST,
        "/api/v1/admin/codes",
        ADMIN_TOKEN,
        serde_json::json!({ "max_uses": 1 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let code = json["data"]["code"].as_str().unwrap();
    assert!(!code.is_empty());
}

#[tokio::test]
async fn settings_round_trip_through_the_api() {
    let env = plain_env().await;
    let app = build_test_app(&env, Arc::new(PaymentProviders::default()));

    let response = send_json_admin(
        app.clone(),
        Method::PUT,
        "/api/v1/admin/settings",
        ADMIN_TOKEN,
        serde_json::json!({ "codes_enabled": true, "app_name": "Selfie Booth" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get_admin(app, "/api/v1/admin/settings", ADMIN_TOKEN).await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["codes_enabled"], true);
    assert_eq!(json["data"]["app_name"], "Selfie Booth");
}

#[tokio::test]
async fn broken_workflow_update_is_rejected() {
    let env = plain_env().await;
    let app = build_test_app(&env, Arc::new(PaymentProviders::default()));

    let response = send_json_admin(
        app,
        Method::PUT,
        "/api/v1/admin/settings",
        ADMIN_TOKEN,
        serde_json::json!({ "workflow_json": "definitely not json" }),
    )
    .await;
    // The template is validated before it is stored.
    assert_ne!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn backend_url_update_replaces_the_snapshot() {
    let env = plain_env().await;
    let state = common::app_state(&env, Arc::new(PaymentProviders::default()));
    let app = genselfie_api::router::build_app_router(state.clone(), state.config.as_ref());

    let response = send_json_admin(
        app,
        Method::PUT,
        "/api/v1/admin/backend-url",
        ADMIN_TOKEN,
        serde_json::json!({ "url": "http://gpu-box:8188/" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["url"], "http://gpu-box:8188");
    assert_eq!(state.backend_url.snapshot().as_str(), "http://gpu-box:8188");
}

#[tokio::test]
async fn empty_backend_url_is_rejected() {
    let env = plain_env().await;
    let app = build_test_app(&env, Arc::new(PaymentProviders::default()));

    let response = send_json_admin(
        app,
        Method::PUT,
        "/api/v1/admin/backend-url",
        ADMIN_TOKEN,
        serde_json::json!({ "url": "  " }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
