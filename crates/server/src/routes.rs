pub mod blobs;
pub mod keys;
pub mod status;

use axum::{
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use utoipa::OpenApi;

use crate::{openapi::ApiDoc, state::AppState};

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Full application router.
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    let api = Router::new()
        .route("/user/keys", get(keys::list_values).put(keys::put_values))
        .route(
            "/user/keys/:key",
            get(keys::get_value).put(keys::put_value).delete(keys::delete_value),
        )
        .route("/user/find/keys", post(keys::find_values))
        .route("/blobs/:name", get(blobs::fetch_blob));

    let public = Router::new()
        .route("/", get(status::index))
        .route("/status", get(status::status))
        .route("/metrics", get(status::metrics_text))
        .route("/api-docs/openapi.json", get(openapi_json));

    public.merge(api).with_state(state).layer(cors).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
            .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
    )
}
