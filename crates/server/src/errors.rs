use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use service::ukv::KvError;
use thiserror::Error;
use tracing::error;

/// Worker failure on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub KvError);

impl From<KvError> for ApiError {
    fn from(e: KvError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            KvError::KeyFormat { .. } | KvError::ValueFormat(_) | KvError::RequestFormat(_) | KvError::BadKeyList { .. } => {
                StatusCode::BAD_REQUEST
            }
            KvError::KeyNotFound(_) | KvError::RequestedKeysNotFound { .. } => StatusCode::NOT_FOUND,
            KvError::Identity(r) => StatusCode::from_u16(r.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            KvError::Configuration(_) | KvError::DataStoreQuery(_) | KvError::Worker(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let msg = self.0.to_string();
        let body = match self.0 {
            KvError::BadKeyList { errors } => json!({"error": msg, "error_by_key": errors}),
            KvError::RequestedKeysNotFound { missing } => json!({"error": msg, "unfound_keys": missing}),
            KvError::Identity(_) => json!({"error": msg}),
            other if status == StatusCode::INTERNAL_SERVER_ERROR => {
                error!(code = other.code(), error = %msg, "request failed");
                json!({"error": format!("{msg} See logs.")})
            }
            _ => json!({"error": msg}),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}

impl From<configs::ConfigError> for StartupError {
    fn from(e: configs::ConfigError) -> Self {
        StartupError::InvalidConfig(e.to_string())
    }
}

impl From<KvError> for StartupError {
    fn from(e: KvError) -> Self {
        StartupError::InvalidConfig(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use service::ukv::IdentityRejection;
    use std::collections::BTreeMap;

    async fn render(e: KvError) -> (StatusCode, serde_json::Value) {
        let resp = ApiError(e).into_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn structured_bodies() {
        let errors = BTreeMap::from([("bad key".to_string(), "Whitespace".to_string())]);
        let (status, body) = render(KvError::BadKeyList { errors }).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_by_key"]["bad key"], "Whitespace");

        let (status, body) = render(KvError::RequestedKeysNotFound { missing: vec!["c".into()] }).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["unfound_keys"], json!(["c"]));
    }

    #[tokio::test]
    async fn store_failures_point_to_logs() {
        let (status, body) = render(KvError::DataStoreQuery("Failed to delete key 'a'.".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to delete key 'a'. See logs.");
    }

    #[tokio::test]
    async fn identity_status_passes_through() {
        let (status, body) = render(KvError::Identity(IdentityRejection { status: 403, message: "nope".into() })).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, json!({"error": "nope"}));
    }
}
