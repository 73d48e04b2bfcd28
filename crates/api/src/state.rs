use std::sync::Arc;

use crate::backend_url::BackendUrl;
use crate::config::ServerConfig;
use crate::engine::{BackendFactory, Orchestrator, PaymentProviders};
use crate::sessions::SessionStore;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: genselfie_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Runtime-mutable generation backend base URL.
    pub backend_url: Arc<BackendUrl>,
    /// Pending checkout sessions.
    pub sessions: Arc<SessionStore>,
    /// Configured payment providers.
    pub providers: Arc<PaymentProviders>,
    /// Backend handle factory (URL snapshot per call).
    pub backends: Arc<dyn BackendFactory>,
    /// The generation engine.
    pub orchestrator: Arc<Orchestrator>,
}
