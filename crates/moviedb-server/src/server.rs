use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    auth::{require_token, Authenticator, Credentials},
    catalog,
    handlers::{authenticate, movies_page},
    normalize::{normalize_not_found, not_found},
    store::MemoryTokenStore,
    AppState,
};

/// How long an issued bearer token stays valid.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(10);
/// Fixed delay imposed on every authorised catalog request.
pub const REQUEST_DELAY: Duration = Duration::from_millis(100);

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub credentials: Credentials,
    pub token_lifetime: Duration,
    pub request_delay: Duration,
    /// How often expired tokens are swept from memory.
    pub sweep_interval: Duration,
    pub cors_origins: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("MOVIEDB_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("MOVIEDB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            credentials: Credentials::fixed(),
            token_lifetime: TOKEN_LIFETIME,
            request_delay: REQUEST_DELAY,
            sweep_interval: Duration::from_secs(1),
            cors_origins: std::env::var("MOVIEDB_CORS_ORIGINS").ok(),
        }
    }
}

/// Assemble the HTTP surface. Every 404, routed or not, leaves through the
/// normalizer.
pub fn build_router(state: AppState) -> Router {
    let catalog = Router::new()
        .route("/api/movies/{year}/{*page}", get(movies_page))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/api/auth", post(authenticate))
        .route("/api/movies", get(not_found))
        .route("/api/movies/{year}", get(not_found))
        .merge(catalog)
        .fallback(not_found)
        .layer(middleware::from_fn(normalize_not_found))
        .with_state(state)
}

pub async fn run(cfg: ServerConfig) -> Result<()> {
    // A catalog that does not decode is fatal: never serve a partial one.
    let catalog = catalog::load_embedded().context("load embedded movie catalog")?;
    info!(files = catalog.files().len(), "movie catalog loaded");

    let tokens = MemoryTokenStore::new(cfg.token_lifetime);
    tokens.clone().spawn_sweep(cfg.sweep_interval);
    info!(
        lifetime_secs = tokens.lifetime().as_secs(),
        sweep_ms = cfg.sweep_interval.as_millis() as u64,
        "token store ready"
    );

    let state = AppState {
        catalog: Arc::new(catalog),
        auth: Authenticator::new(cfg.credentials, Arc::new(tokens)),
        request_delay: cfg.request_delay,
    };

    let app = build_router(state)
        .layer(build_cors(cfg.cors_origins.as_deref()))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .context("invalid host/port")?;

    info!(%addr, "movie server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind listener")?;

    axum::serve(listener, app).await.context("server error")
}

fn build_cors(origins: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(Any);

    match origins {
        Some(o) => {
            let origins: Vec<_> = o.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            cors.allow_origin(origins)
        }
        None => cors.allow_origin(Any),
    }
}
