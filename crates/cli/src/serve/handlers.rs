//! Read-side HTTP handlers: health, per-work listings, fallback.
//!
//! The list endpoints are single pool queries with no snapshot; ordering
//! (newest first) comes from the storage layer. Bodies are the record
//! types serialized directly, as bare JSON arrays.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use canteiro_storage::{CanteiroStorage, StorageError};

use super::json_error;
use super::state::AppState;

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    let response = serde_json::json!({
        "status": "ok",
        "service": "canteiro",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": timestamp,
    });
    (StatusCode::OK, Json(response))
}

fn list_response<T: serde::Serialize>(result: Result<Vec<T>, StorageError>) -> Response {
    match result {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()).into_response(),
    }
}

/// GET /tasks/list/{work_id}
pub(crate) async fn handle_list_tasks(
    State(state): State<Arc<AppState>>,
    Path(work_id): Path<i64>,
) -> Response {
    list_response(state.storage.list_activities(work_id).await)
}

/// GET /pcc/list/{work_id}
pub(crate) async fn handle_list_pcc_events(
    State(state): State<Arc<AppState>>,
    Path(work_id): Path<i64>,
) -> Response {
    list_response(state.storage.list_pcc_events(work_id).await)
}

/// GET /fvs/list/{work_id}
pub(crate) async fn handle_list_fvs_events(
    State(state): State<Arc<AppState>>,
    Path(work_id): Path<i64>,
) -> Response {
    list_response(state.storage.list_fvs_events(work_id).await)
}

/// GET /nc/list/{work_id}
pub(crate) async fn handle_list_nonconformities(
    State(state): State<Arc<AppState>>,
    Path(work_id): Path<i64>,
) -> Response {
    list_response(state.storage.list_nonconformities(work_id).await)
}
