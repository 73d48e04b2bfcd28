//! Orchestration engine: admission, backend selection, and the
//! generation lifecycle.

pub mod admission;
pub mod orchestrator;

use std::sync::Arc;

use genselfie_comfyui::{ComfyUIApi, GenerationBackend};

use crate::backend_url::BackendUrl;

pub use admission::{AdmissionGate, AdmissionRequest, PaymentProviders};
pub use orchestrator::{GenerationView, ImageSource, Orchestrator, StartRequest};

/// Hands out a backend handle bound to the base URL in force at the time
/// of the call. Each orchestration operation takes one handle and keeps
/// it for its whole run.
pub trait BackendFactory: Send + Sync {
    fn backend(&self) -> Arc<dyn GenerationBackend>;
}

/// Production factory: one shared HTTP client, URL snapshotted per call.
pub struct ComfyUIFactory {
    client: reqwest::Client,
    url: Arc<BackendUrl>,
}

impl ComfyUIFactory {
    pub fn new(url: Arc<BackendUrl>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

impl BackendFactory for ComfyUIFactory {
    fn backend(&self) -> Arc<dyn GenerationBackend> {
        let base = self.url.snapshot();
        Arc::new(ComfyUIApi::with_client(self.client.clone(), base.as_str()))
    }
}
