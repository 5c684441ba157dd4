//! `canteiro serve` -- HTTP JSON API for construction-site quality control.
//!
//! Exposes the workflow engine and the SQLite event log as an async HTTP
//! service using `axum` + `tokio`. Every mutating request runs in exactly
//! one storage snapshot: it either commits the full outcome (event row,
//! optional non-conformity, status update) or leaves no trace.
//!
//! Security features:
//! - CORS headers on all responses (permissive for local dev)
//! - Per-IP rate limiting (default: 60 req/min, configurable)
//! - Optional API key authentication via CANTEIRO_API_KEY env var
//!
//! Endpoints:
//! - GET  /health                  - Server status (exempt from auth)
//! - POST /pcc/confirm             - Confirm the pre-execution checklist
//! - GET  /pcc/list/{work_id}      - PCC confirmations of a work
//! - POST /fvs/inspect             - Record an inspection (PASS/FAIL)
//! - GET  /fvs/list/{work_id}      - FVS inspections of a work
//! - GET  /nc/list/{work_id}       - Non-conformities of a work
//! - GET  /tasks/list/{work_id}    - Activities of a work
//!
//! All responses use Content-Type: application/json.

mod handlers;
mod middleware;
mod state;
mod workflow;

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use canteiro_storage::SqliteStorage;

use self::handlers::{
    handle_health, handle_list_fvs_events, handle_list_nonconformities, handle_list_pcc_events,
    handle_list_tasks, handle_not_found,
};
use self::middleware::{auth_middleware, rate_limit_middleware};
use self::state::{AppState, RateLimiter};
use self::workflow::{handle_confirm_pcc, handle_inspect_fvs};

/// Maximum request body size: 1 MB. Workflow payloads are small.
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Default rate limit: 60 requests per minute per IP.
const DEFAULT_RATE_LIMIT: u64 = 60;

/// Rate limit window duration in seconds (1 minute).
const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}

/// Build the router over an already-connected storage backend.
fn build_router(state: Arc<AppState>) -> Router {
    // CORS: permissive for local dev; tighten for production.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/pcc/confirm", post(handle_confirm_pcc))
        .route("/pcc/list/{work_id}", get(handle_list_pcc_events))
        .route("/fvs/inspect", post(handle_inspect_fvs))
        .route("/fvs/list/{work_id}", get(handle_list_fvs_events))
        .route("/nc/list/{work_id}", get(handle_list_nonconformities))
        .route("/tasks/list/{work_id}", get(handle_list_tasks))
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

/// Start the HTTP server on `bind:port`, backed by the given database.
///
/// When TLS cert/key paths are provided, the server listens over HTTPS
/// using `axum-server` with rustls. Otherwise it uses plain HTTP.
///
/// Security:
/// - CORS: Permissive (`Any` origin) for local dev.
/// - Rate limit: Per-IP, `CANTEIRO_RATE_LIMIT` env var (default 60 req/min).
/// - API key: If `CANTEIRO_API_KEY` is set, all endpoints except /health require auth.
pub async fn start_server(
    port: u16,
    bind: String,
    database_url: String,
    _tls_cert: Option<PathBuf>,
    _tls_key: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let storage = SqliteStorage::connect(&database_url).await?;
    info!(database = %database_url, "storage connected");

    // Rate limit: from CANTEIRO_RATE_LIMIT env var, or default
    let rate_limit = std::env::var("CANTEIRO_RATE_LIMIT")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_RATE_LIMIT);

    // API key: from CANTEIRO_API_KEY env var (None = no auth)
    let api_key = std::env::var("CANTEIRO_API_KEY")
        .ok()
        .filter(|k| !k.is_empty());

    if api_key.is_some() {
        info!("API key authentication enabled");
    }
    info!(rate_limit, "rate limit: requests per minute per IP");

    let state = Arc::new(AppState {
        storage,
        rate_limiter: RateLimiter::new(rate_limit),
        api_key,
    });

    let app = build_router(state);
    let addr = format!("{}:{}", bind, port);

    // TLS support via axum-server + rustls (requires `tls` feature)
    #[cfg(feature = "tls")]
    if let (Some(cert_path), Some(key_path)) = (&_tls_cert, &_tls_key) {
        let config =
            axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path).await?;
        let socket_addr: std::net::SocketAddr = addr.parse()?;
        info!("canteiro API listening on https://{}", addr);
        axum_server::bind_rustls(socket_addr, config)
            .serve(app.into_make_service_with_connect_info::<std::net::SocketAddr>())
            .await?;
        return Ok(());
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("canteiro API listening on http://{}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    info!("received shutdown signal");
}
