use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, info};

use crate::{
    auth::Credentials,
    catalog::{Entry, FsError},
    AppState,
};

// ── Auth ──────────────────────────────────────────────────────────────────────

/// `POST /api/auth`. A body that fails to decode is treated exactly like a
/// wrong password; clients match on the error message.
pub async fn authenticate(State(state): State<AppState>, body: Bytes) -> Response {
    let creds: Credentials = serde_json::from_slice(&body).unwrap_or_default();

    match state.auth.authenticate(&creds.username, &creds.password) {
        Ok(token) => {
            info!("audit: token.issue");
            Json(json!({
                "bearer": token.bearer,
                "timeout": token.lifetime.as_secs(),
            }))
            .into_response()
        }
        Err(rejected) => rejected.into_response(),
    }
}

// ── Movies ────────────────────────────────────────────────────────────────────

/// `GET /api/movies/{year}/{*page}`, behind `require_token`.
pub async fn movies_page(
    State(state): State<AppState>,
    Path((year, page)): Path<(String, String)>,
) -> Response {
    // Admission control: every catalog hit costs the caller a fixed delay.
    tokio::time::sleep(state.request_delay).await;

    let path = format!("{year}/{page}");
    serve_path(&state, &path)
}

/// Serve a file's bytes or list a directory, static-file-server style.
fn serve_path(state: &AppState, path: &str) -> Response {
    match state.catalog.open(path) {
        Ok(Entry::File(data)) => (
            [(header::CONTENT_TYPE, "application/json")],
            data.clone(),
        )
            .into_response(),
        Ok(Entry::Dir(_)) => match state.catalog.read_dir(path) {
            Ok(names) => Json(names).into_response(),
            Err(e) => missing(path, &e),
        },
        Err(e) => missing(path, &e),
    }
}

fn missing(path: &str, e: &FsError) -> Response {
    debug!(path, error = %e, "catalog miss");
    // Body is replaced by the not-found normalizer.
    (StatusCode::NOT_FOUND, "404 page not found\n").into_response()
}
