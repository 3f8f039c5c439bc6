use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use service::ukv::KvError;

use crate::{errors::ApiError, state::AppState};

#[utoipa::path(
    get, path = "/blobs/{name}", tag = "user-keys",
    params(("name" = String, Path, description = "Blob name from a 303 Location header")),
    responses(
        (status = 200, description = "Offloaded key/value list"),
        (status = 404, description = "Unknown or expired", body = crate::openapi::ErrorDoc)
    )
)]
pub async fn fetch_blob(State(state): State<AppState>, Path(name): Path<String>) -> Result<Response, ApiError> {
    let gone = || ApiError(KvError::KeyNotFound("The requested response is not available.".into()));
    let Some(store) = &state.blobs else { return Err(gone()) };
    match store.open(&name).await? {
        Some(body) => Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response()),
        None => Err(gone()),
    }
}
