use std::future::Future;
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::{metrics, types::MessageBody};
use service::ukv::{InboundRequest, KeyValue, KvError, Prepared};

use crate::{errors::ApiError, state::AppState};

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn inbound(headers: &HeaderMap, body: Bytes) -> InboundRequest {
    InboundRequest::new(
        header_str(headers, header::CONTENT_TYPE),
        header_str(headers, header::AUTHORIZATION),
        body.to_vec(),
    )
}

fn outcome<T>(res: &Result<T, KvError>) -> &'static str {
    match res {
        Ok(_) => "ok",
        Err(KvError::Identity(_)) => "identity",
        Err(e) if e.is_request_error() => "bad_request",
        Err(e) if e.is_not_found() => "not_found",
        Err(_) => "error",
    }
}

/// Run a worker call, recording its outcome and latency.
async fn timed<T, F>(operation: &'static str, fut: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, KvError>>,
{
    let started = Instant::now();
    let res = fut.await;
    metrics::observe(operation, outcome(&res), started.elapsed().as_secs_f64());
    res.map_err(ApiError::from)
}

/// Inline JSON, or `303 See Other` when the body was offloaded.
async fn key_value_list_response(state: &AppState, items: Vec<KeyValue>) -> Result<Response, ApiError> {
    let body = serde_json::to_vec(&items)
        .map_err(|e| ApiError(KvError::Worker(format!("Unable to serialize key/value list: {e}."))))?;
    let prepared = match &state.offload {
        Some(offload) => offload.prepare(body).await?,
        None => Prepared::Inline(body),
    };
    Ok(match prepared {
        Prepared::Inline(bytes) => ([(header::CONTENT_TYPE, "application/json")], Body::from(bytes)).into_response(),
        Prepared::Redirect { location } => {
            (StatusCode::SEE_OTHER, [(header::LOCATION, location.clone())], location).into_response()
        }
    })
}

#[utoipa::path(
    get, path = "/user/keys/{key}", tag = "user-keys",
    params(("key" = String, Path, description = "Key name, matched case-insensitively")),
    responses(
        (status = 200, description = "Stored JSON value"),
        (status = 400, description = "Invalid key", body = crate::openapi::ErrorDoc),
        (status = 401, description = "Missing or invalid bearer token", body = crate::openapi::ErrorDoc),
        (status = 404, description = "Key not found", body = crate::openapi::ErrorDoc),
        (status = 500, description = "Store failure", body = crate::openapi::ErrorDoc)
    )
)]
pub async fn get_value(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let req = inbound(&headers, Bytes::new());
    let value = timed("get_value", state.worker.get_key_value(&req, &key)).await?;
    Ok(Json(value))
}

#[utoipa::path(
    put, path = "/user/keys/{key}", tag = "user-keys",
    params(("key" = String, Path, description = "Key name; stored with this casing")),
    request_body(content = Object, description = "Non-empty JSON object or array", content_type = "application/json"),
    responses(
        (status = 200, description = "Stored", body = crate::openapi::MessageDoc),
        (status = 400, description = "Invalid key, content type or value", body = crate::openapi::ErrorDoc),
        (status = 401, description = "Missing or invalid bearer token", body = crate::openapi::ErrorDoc),
        (status = 500, description = "Store failure", body = crate::openapi::ErrorDoc)
    )
)]
pub async fn put_value(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MessageBody>, ApiError> {
    let req = inbound(&headers, body);
    let message = timed("upsert_value", state.worker.upsert_key_value(&req, &key)).await?;
    Ok(Json(MessageBody::new(message)))
}

#[utoipa::path(
    delete, path = "/user/keys/{key}", tag = "user-keys",
    params(("key" = String, Path, description = "Key name, matched case-insensitively")),
    responses(
        (status = 200, description = "Deleted", body = crate::openapi::MessageDoc),
        (status = 400, description = "Invalid key", body = crate::openapi::ErrorDoc),
        (status = 401, description = "Missing or invalid bearer token", body = crate::openapi::ErrorDoc),
        (status = 404, description = "Key not found", body = crate::openapi::ErrorDoc),
        (status = 500, description = "Store failure", body = crate::openapi::ErrorDoc)
    )
)]
pub async fn delete_value(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<Json<MessageBody>, ApiError> {
    let req = inbound(&headers, Bytes::new());
    let message = timed("delete_value", state.worker.delete_key_value(&req, &key)).await?;
    Ok(Json(MessageBody::new(message)))
}

#[utoipa::path(
    get, path = "/user/keys", tag = "user-keys",
    responses(
        (status = 200, description = "Every key/value pair for the caller", body = [crate::openapi::KeyValueDoc]),
        (status = 303, description = "Response too large; fetch it from Location"),
        (status = 401, description = "Missing or invalid bearer token", body = crate::openapi::ErrorDoc),
        (status = 404, description = "Nothing stored", body = crate::openapi::ErrorDoc),
        (status = 500, description = "Store failure", body = crate::openapi::ErrorDoc)
    )
)]
pub async fn list_values(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let req = inbound(&headers, Bytes::new());
    let items = timed("list_values", state.worker.get_all_key_values(&req)).await?;
    key_value_list_response(&state, items).await
}

#[utoipa::path(
    put, path = "/user/keys", tag = "user-keys",
    request_body(content = [crate::openapi::KeyValueDoc], description = "Pairs to store atomically", content_type = "application/json"),
    responses(
        (status = 200, description = "Stored", body = crate::openapi::MessageDoc),
        (status = 400, description = "Invalid keys or values", body = crate::openapi::BadKeyListDoc),
        (status = 401, description = "Missing or invalid bearer token", body = crate::openapi::ErrorDoc),
        (status = 500, description = "Store failure; nothing stored", body = crate::openapi::ErrorDoc)
    )
)]
pub async fn put_values(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Json<MessageBody>, ApiError> {
    let req = inbound(&headers, body);
    let message = timed("upsert_values", state.worker.upsert_key_values(&req)).await?;
    Ok(Json(MessageBody::new(message)))
}

#[utoipa::path(
    post, path = "/user/find/keys", tag = "user-keys",
    request_body(content = [String], description = "Key names to fetch", content_type = "application/json"),
    responses(
        (status = 200, description = "Every requested pair", body = [crate::openapi::KeyValueDoc]),
        (status = 303, description = "Response too large; fetch it from Location"),
        (status = 400, description = "Invalid keys or body", body = crate::openapi::BadKeyListDoc),
        (status = 401, description = "Missing or invalid bearer token", body = crate::openapi::ErrorDoc),
        (status = 404, description = "Some keys not found", body = crate::openapi::UnfoundKeysDoc),
        (status = 500, description = "Store failure", body = crate::openapi::ErrorDoc)
    )
)]
pub async fn find_values(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Response, ApiError> {
    let req = inbound(&headers, body);
    let items = timed("find_values", state.worker.find_named_key_values(&req)).await?;
    key_value_list_response(&state, items).await
}
