use std::net::SocketAddr;
use std::sync::Arc;

use genselfie_comfyui::JobResolver;
use genselfie_payments::{LnbitsProvider, PaymentProvider, StripeProvider};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use genselfie_api::backend_url::BackendUrl;
use genselfie_api::config::ServerConfig;
use genselfie_api::engine::{ComfyUIFactory, Orchestrator, PaymentProviders};
use genselfie_api::router::build_app_router;
use genselfie_api::sessions::SessionStore;
use genselfie_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "genselfie_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://genselfie.db".into());

    let pool = genselfie_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    genselfie_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    genselfie_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    // --- Data directories ---
    for dir in ["uploads", "examples", "generated"] {
        std::fs::create_dir_all(config.data_dir.join(dir)).expect("Failed to create data dir");
    }

    // --- Backend URL + factory ---
    let backend_url = Arc::new(BackendUrl::new(config.comfyui_url.clone()));
    let backends = Arc::new(ComfyUIFactory::new(Arc::clone(&backend_url)));
    tracing::info!(url = %backend_url.snapshot(), "Generation backend configured");

    // --- Payment providers ---
    let stripe: Option<Arc<dyn PaymentProvider>> =
        match (&config.stripe_secret_key, &config.stripe_publishable_key) {
            (Some(secret), Some(publishable)) => {
                tracing::info!("Stripe provider configured");
                Some(Arc::new(StripeProvider::new(
                    secret.clone(),
                    publishable.clone(),
                )))
            }
            _ => None,
        };
    let lightning: Option<Arc<dyn PaymentProvider>> =
        match (&config.lnbits_url, &config.lnbits_api_key) {
            (Some(url), Some(key)) => {
                tracing::info!("LNbits provider configured");
                Some(Arc::new(LnbitsProvider::new(url.clone(), key.clone())))
            }
            _ => None,
        };
    let providers = Arc::new(PaymentProviders { stripe, lightning });

    // --- Orchestrator ---
    let resolver = JobResolver {
        poll_budget: config.poll_budget,
        ..JobResolver::default()
    };
    let orchestrator = Arc::new(Orchestrator::new(
        pool.clone(),
        config.data_dir.clone(),
        resolver,
        backends.clone(),
        Arc::clone(&providers),
    ));

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        backend_url,
        sessions: Arc::new(SessionStore::default()),
        providers,
        backends,
        orchestrator,
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
