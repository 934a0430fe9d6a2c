//! `octave serve`: HTTP JSON API over the validate, write and eject
//! operations, using `axum` + `tokio`.
//!
//! - CORS headers on all responses (permissive)
//! - Per-IP rate limiting (`[serve] rate_limit`, or `OCTAVE_RATE_LIMIT`)
//! - Optional API key authentication via `OCTAVE_API_KEY`
//!
//! Endpoints:
//! - GET  /health   - Server status (exempt from auth)
//! - POST /validate - Canonicalize and validate content
//! - POST /write    - Canonicalize, validate and store a document
//! - POST /eject    - Project a document or schema template
//!
//! All responses use Content-Type: application/json.

mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use octave_core::FileSystemSchemas;
use octave_storage::FsStore;
use tower_http::cors::{Any, CorsLayer};

use self::handlers::{handle_eject, handle_health, handle_not_found, handle_validate, handle_write};
use self::middleware::{auth_middleware, rate_limit_middleware};
use self::state::{AppState, RateLimiter};
use crate::config::Config;

/// Maximum request body size: 10 MB.
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Maximum document content size: 1 MB.
const MAX_SOURCE_SIZE: usize = 1024 * 1024;

/// Rate limit window duration in seconds.
const RATE_LIMIT_WINDOW_SECS: u64 = 60;

fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/validate", post(handle_validate))
        .route("/write", post(handle_write))
        .route("/eject", post(handle_eject))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Start the HTTP server on the given port.
pub(crate) async fn start_server(port: u16, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let rate_limit = std::env::var("OCTAVE_RATE_LIMIT")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(config.serve.rate_limit);

    let api_key = std::env::var("OCTAVE_API_KEY")
        .ok()
        .filter(|k| !k.is_empty());

    if api_key.is_some() {
        tracing::info!("API key authentication enabled");
    }
    tracing::info!(
        rate_limit,
        schema_dir = %config.schema_dir.display(),
        store_root = %config.store_root.display(),
        "serving documents"
    );

    let state = Arc::new(AppState {
        schemas: FileSystemSchemas::new(&config.schema_dir),
        store: FsStore::new(&config.store_root),
        rate_limiter: RateLimiter::new(rate_limit),
        api_key,
    });

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("OCTAVE server listening on http://{}", addr);
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server shut down");
    Ok(())
}

/// Wait for Ctrl+C. If the handler cannot be installed the server runs
/// until killed.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received shutdown signal"),
        Err(e) => {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}
