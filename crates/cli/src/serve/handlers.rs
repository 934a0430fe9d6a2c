//! Route handlers. The boundary operations are synchronous (file IO,
//! per-path locks) and run on the blocking pool.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use octave_tools::{EjectRequest, ToolError, ValidateRequest, WriteRequest};
use serde::Serialize;

use super::state::AppState;
use super::{json_error, MAX_SOURCE_SIZE};

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "octave_version": octave_core::OCTAVE_VERSION,
    });
    (StatusCode::OK, Json(response))
}

fn status_for(err: &ToolError) -> StatusCode {
    match err.code() {
        "E020" => StatusCode::CONFLICT,
        "NOT_FOUND" => StatusCode::NOT_FOUND,
        "E017" => StatusCode::UNPROCESSABLE_ENTITY,
        _ if err.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn tool_error(err: ToolError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!(code = err.code(), error = %err, "request failed");
    }
    (status, Json(err.to_json_value())).into_response()
}

fn check_size(content: Option<&str>) -> Result<(), Response> {
    match content {
        Some(c) if c.len() > MAX_SOURCE_SIZE => Err(json_error(
            StatusCode::PAYLOAD_TOO_LARGE,
            &format!("content exceeds {} bytes", MAX_SOURCE_SIZE),
        )
        .into_response()),
        _ => Ok(()),
    }
}

/// Run a boundary operation on the blocking pool and map its result.
async fn run_blocking<T, F>(state: Arc<AppState>, op: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce(&AppState) -> Result<T, ToolError> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || op(&state)).await {
        Ok(Ok(body)) => (StatusCode::OK, Json(body)).into_response(),
        Ok(Err(e)) => tool_error(e),
        Err(e) => {
            tracing::error!(error = %e, "blocking task failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}

/// POST /validate
pub(crate) async fn handle_validate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ValidateRequest>,
) -> Response {
    // Server-side paths are not readable over HTTP.
    if req.file_path.is_some() {
        return json_error(StatusCode::BAD_REQUEST, "file_path is not accepted over HTTP; send content")
            .into_response();
    }
    if let Err(resp) = check_size(req.content.as_deref()) {
        return resp;
    }
    run_blocking(state, move |s| octave_tools::validate(&req, &s.schemas)).await
}

/// POST /write
pub(crate) async fn handle_write(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WriteRequest>,
) -> Response {
    if let Err(resp) = check_size(req.content.as_deref()) {
        return resp;
    }
    run_blocking(state, move |s| octave_tools::write(&req, &s.store, &s.schemas)).await
}

/// POST /eject
pub(crate) async fn handle_eject(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EjectRequest>,
) -> Response {
    if let Err(resp) = check_size(req.content.as_deref()) {
        return resp;
    }
    run_blocking(state, move |s| octave_tools::eject(&req, &s.schemas)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use octave_storage::StorageError;

    #[test]
    fn conflicts_map_to_409() {
        let err = ToolError::Storage(StorageError::ConcurrentConflict {
            path: "a.oct.md".into(),
            expected: "x".into(),
            actual: None,
        });
        assert_eq!(status_for(&err), StatusCode::CONFLICT);
    }

    #[test]
    fn invalid_documents_map_to_422() {
        let err = ToolError::Invalid { errors: vec![] };
        assert_eq!(status_for(&err), StatusCode::UNPROCESSABLE_ENTITY);
        let req = ToolError::InvalidRequest {
            message: "bad".into(),
        };
        assert_eq!(status_for(&req), StatusCode::BAD_REQUEST);
    }
}
