//! Shared test fixtures: a scripted generation backend, a canned payment
//! provider, and environment builders over an in-memory database.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use genselfie_api::backend_url::BackendUrl;
use genselfie_api::config::ServerConfig;
use genselfie_api::engine::{BackendFactory, Orchestrator, PaymentProviders};
use genselfie_api::sessions::SessionStore;
use genselfie_api::state::AppState;
use genselfie_comfyui::{
    ComfyUIApiError, GenerationBackend, JobResolver, OutputLocator, QueueSnapshot,
};
use genselfie_db::models::influencer_image::CreateInfluencerImage;
use genselfie_db::models::settings::UpdateSettings;
use genselfie_db::repositories::{InfluencerImageRepo, SettingsRepo};
use genselfie_db::DbPool;
use genselfie_payments::{CreatedPayment, PaymentError, PaymentProvider};

pub const ADMIN_TOKEN: &str = "test-admin-token-0123456789";

/// A minimal but structurally complete workflow graph.
pub const TEMPLATE: &str = r#"{
    "3": { "class_type": "KSampler", "inputs": { "seed": 0, "steps": 20 } },
    "5": { "class_type": "EmptyLatentImage",
           "inputs": { "width": 512, "height": 512, "batch_size": 1 } },
    "6": { "class_type": "CLIPTextEncode", "inputs": { "text": "placeholder" } },
    "42": { "class_type": "LoadImage", "inputs": { "image": "old_subject.png" },
            "_meta": { "title": "Influencer Reference" } },
    "46": { "class_type": "LoadImage", "inputs": { "image": "old_input.png" },
            "_meta": { "title": "Fan Photo" } }
}"#;

// ---------------------------------------------------------------------------
// Scripted backend
// ---------------------------------------------------------------------------

/// Backend whose responses are scripted per test. Queue frames are
/// consumed one per snapshot call; the last frame repeats.
#[derive(Default)]
pub struct FakeBackend {
    submit_response: Mutex<Option<String>>,
    queue_frames: Mutex<Vec<Result<QueueSnapshot, u16>>>,
    history: Mutex<Option<Value>>,
    download: Mutex<Option<Vec<u8>>>,
    pub uploads: Mutex<Vec<String>>,
    pub queue_calls: AtomicUsize,
}

impl FakeBackend {
    /// A backend that accepts submissions under the given job id.
    pub fn submitting(job_id: &str) -> Self {
        Self {
            submit_response: Mutex::new(Some(job_id.to_string())),
            ..Self::default()
        }
    }

    /// A backend that refuses every submission.
    pub fn refusing() -> Self {
        Self::default()
    }

    pub fn script_queue(&self, frames: Vec<Result<QueueSnapshot, u16>>) {
        *self.queue_frames.lock().unwrap() = frames;
    }

    pub fn set_history(&self, history: Value) {
        *self.history.lock().unwrap() = Some(history);
    }

    pub fn set_download(&self, bytes: Vec<u8>) {
        *self.download.lock().unwrap() = Some(bytes);
    }
}

#[async_trait]
impl GenerationBackend for FakeBackend {
    fn base_url(&self) -> &str {
        "http://fake:8188"
    }

    async fn upload_image(&self, _bytes: Vec<u8>, filename: &str) -> bool {
        self.uploads.lock().unwrap().push(filename.to_string());
        true
    }

    async fn upload_image_from_url(&self, url: &str, _filename: &str) -> bool {
        self.uploads.lock().unwrap().push(url.to_string());
        true
    }

    async fn submit_workflow(&self, _graph: &Value) -> Option<String> {
        self.submit_response.lock().unwrap().clone()
    }

    async fn queue_snapshot(&self) -> Result<QueueSnapshot, ComfyUIApiError> {
        self.queue_calls.fetch_add(1, Ordering::SeqCst);
        let mut frames = self.queue_frames.lock().unwrap();
        let frame = if frames.len() > 1 {
            frames.remove(0)
        } else {
            frames.first().cloned().unwrap_or(Ok(QueueSnapshot::default()))
        };
        frame.map_err(|status| ComfyUIApiError::ApiError {
            status,
            body: "scripted failure".into(),
        })
    }

    async fn get_history(&self, _job_id: &str) -> Option<Value> {
        self.history.lock().unwrap().clone()
    }

    async fn download_output(&self, _locator: &OutputLocator) -> Option<Vec<u8>> {
        self.download.lock().unwrap().clone()
    }
}

pub struct FakeFactory(pub Arc<FakeBackend>);

impl BackendFactory for FakeFactory {
    fn backend(&self) -> Arc<dyn GenerationBackend> {
        self.0.clone()
    }
}

pub fn queue_with(job_id: &str) -> QueueSnapshot {
    QueueSnapshot {
        queue_pending: vec![],
        queue_running: vec![json!([0, job_id, {}])],
    }
}

pub fn empty_queue() -> QueueSnapshot {
    QueueSnapshot::default()
}

pub fn history_with_output(job_id: &str) -> Value {
    json!({
        job_id: {
            "outputs": {
                "9": { "images": [{ "filename": "out.png", "subfolder": "" }] }
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Canned payment provider
// ---------------------------------------------------------------------------

pub struct FakeProvider {
    pub paid: bool,
}

#[async_trait]
impl PaymentProvider for FakeProvider {
    fn method(&self) -> &'static str {
        "stripe"
    }

    async fn create(
        &self,
        _amount_cents: i64,
        _currency: &str,
    ) -> Result<CreatedPayment, PaymentError> {
        Ok(CreatedPayment {
            payment_ref: "pi_test".into(),
            client_secret: "cs_test".into(),
            extra: serde_json::Map::new(),
        })
    }

    async fn check(&self, _payment_ref: &str) -> bool {
        self.paid
    }
}

// ---------------------------------------------------------------------------
// Environment builders
// ---------------------------------------------------------------------------

pub struct TestEnv {
    pub pool: DbPool,
    pub backend: Arc<FakeBackend>,
    pub orchestrator: Arc<Orchestrator>,
    pub data_dir: PathBuf,
}

/// Orchestrator over an in-memory database, a fresh temp data dir, and
/// the given backend and providers. The resolver is tuned so bounded
/// loops finish in milliseconds.
pub async fn test_env(backend: FakeBackend, providers: PaymentProviders) -> TestEnv {
    let pool = genselfie_db::test_pool().await;
    let data_dir =
        std::env::temp_dir().join(format!("genselfie-test-{}", uuid::Uuid::new_v4().simple()));
    tokio::fs::create_dir_all(data_dir.join("uploads"))
        .await
        .expect("test data dir");

    let backend = Arc::new(backend);
    let orchestrator = Arc::new(Orchestrator::new(
        pool.clone(),
        data_dir.clone(),
        JobResolver::new(Duration::from_millis(1), 5),
        Arc::new(FakeFactory(backend.clone())),
        Arc::new(providers),
    ));

    TestEnv {
        pool,
        backend,
        orchestrator,
        data_dir,
    }
}

/// Store the workflow template and flip the given toggles.
pub async fn seed_settings(pool: &DbPool, patch: UpdateSettings) {
    let patch = UpdateSettings {
        workflow_json: patch.workflow_json.or_else(|| Some(TEMPLATE.to_string())),
        ..patch
    };
    SettingsRepo::update(pool, &patch).await.expect("seed settings");
}

/// Register a primary subject reference image backed by a real file.
pub async fn seed_subject(pool: &DbPool, data_dir: &PathBuf) {
    tokio::fs::write(data_dir.join("uploads/subject_ref.png"), b"fake png")
        .await
        .expect("subject file");
    InfluencerImageRepo::create(
        pool,
        &CreateInfluencerImage {
            filename: "subject_ref.png".into(),
            original_name: "subject.png".into(),
            is_primary: true,
        },
    )
    .await
    .expect("subject row");
}

/// Build the full application router around a [`TestEnv`], with the same
/// middleware stack production uses.
pub fn build_test_app(env: &TestEnv, providers: Arc<PaymentProviders>) -> Router {
    let state = app_state(env, providers);
    let config = state.config.clone();
    genselfie_api::router::build_app_router(state, config.as_ref())
}

/// Full HTTP application state around a [`TestEnv`].
pub fn app_state(env: &TestEnv, providers: Arc<PaymentProviders>) -> AppState {
    let config = ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".into()],
        request_timeout_secs: 30,
        data_dir: env.data_dir.clone(),
        admin_token: ADMIN_TOKEN.into(),
        comfyui_url: "http://fake:8188".into(),
        poll_budget: 5,
        price_cents: 500,
        stripe_secret_key: None,
        stripe_publishable_key: None,
        lnbits_url: None,
        lnbits_api_key: None,
    };

    AppState {
        pool: env.pool.clone(),
        config: Arc::new(config),
        backend_url: Arc::new(BackendUrl::new("http://fake:8188")),
        sessions: Arc::new(SessionStore::default()),
        providers,
        backends: Arc::new(FakeFactory(env.backend.clone())),
        orchestrator: env.orchestrator.clone(),
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get_admin(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn send_json_admin(
    app: Router,
    method: Method,
    uri: &str,
    token: &str,
    body: Value,
) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body");
    serde_json::from_slice(&bytes).expect("response JSON")
}
