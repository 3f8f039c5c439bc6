use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::{env::read_trimmed_or_unknown, metrics, types::StatusReport};
use tracing::error;

use crate::state::AppState;

pub async fn index() -> &'static str {
    "Hello! This is the User Key/Value API service :)"
}

#[utoipa::path(
    get, path = "/status", tag = "status",
    responses((status = 200, description = "Version, build and store reachability", body = crate::openapi::StatusDoc))
)]
pub async fn status(State(state): State<AppState>) -> Json<StatusReport> {
    let version = read_trimmed_or_unknown(&state.status.version_file).await;
    let build = read_trimmed_or_unknown(&state.status.build_file).await;
    let store_connection = state.worker.test_connection().await;
    Json(StatusReport { version, build, store_connection })
}

pub async fn metrics_text() -> Response {
    match metrics::encode_metrics() {
        Ok(text) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], text).into_response(),
        Err(e) => {
            error!(error = %e, "metrics encode failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}
