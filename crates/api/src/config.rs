use std::path::PathBuf;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Root directory for uploads, example inputs, and generated outputs.
    pub data_dir: PathBuf,
    /// Static bearer token gating the admin surface.
    pub admin_token: String,
    /// Initial generation backend base URL (changeable at runtime).
    pub comfyui_url: String,
    /// Maximum completion polls per job before giving up.
    pub poll_budget: u32,
    /// Fallback price when a checkout names no preset.
    pub price_cents: i64,
    /// Stripe keys; card payments stay disabled without them.
    pub stripe_secret_key: Option<String>,
    pub stripe_publishable_key: Option<String>,
    /// LNbits instance; Lightning payments stay disabled without it.
    pub lnbits_url: Option<String>,
    pub lnbits_api_key: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                    |
    /// |--------------------------|----------------------------|
    /// | `HOST`                   | `0.0.0.0`                  |
    /// | `PORT`                   | `3000`                     |
    /// | `CORS_ORIGINS`           | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                       |
    /// | `DATA_DIR`               | `./data`                   |
    /// | `ADMIN_TOKEN`            | (required)                 |
    /// | `COMFYUI_URL`            | `http://127.0.0.1:8188`    |
    /// | `POLL_BUDGET`            | `120`                      |
    /// | `PRICE_CENTS`            | `500`                      |
    /// | `STRIPE_SECRET_KEY`      | (unset)                    |
    /// | `STRIPE_PUBLISHABLE_KEY` | (unset)                    |
    /// | `LNBITS_URL`             | (unset)                    |
    /// | `LNBITS_API_KEY`         | (unset)                    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let data_dir = PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".into()));

        let admin_token = std::env::var("ADMIN_TOKEN").expect("ADMIN_TOKEN must be set");
        assert!(
            admin_token.len() >= 16,
            "ADMIN_TOKEN must be at least 16 characters"
        );

        let comfyui_url = std::env::var("COMFYUI_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8188".into())
            .trim_end_matches('/')
            .to_string();

        let poll_budget: u32 = std::env::var("POLL_BUDGET")
            .unwrap_or_else(|_| "120".into())
            .parse()
            .expect("POLL_BUDGET must be a valid u32");

        let price_cents: i64 = std::env::var("PRICE_CENTS")
            .unwrap_or_else(|_| "500".into())
            .parse()
            .expect("PRICE_CENTS must be a valid i64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            data_dir,
            admin_token,
            comfyui_url,
            poll_budget,
            price_cents,
            stripe_secret_key: std::env::var("STRIPE_SECRET_KEY").ok(),
            stripe_publishable_key: std::env::var("STRIPE_PUBLISHABLE_KEY").ok(),
            lnbits_url: std::env::var("LNBITS_URL").ok(),
            lnbits_api_key: std::env::var("LNBITS_API_KEY").ok(),
        }
    }
}
