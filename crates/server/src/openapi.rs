use std::collections::BTreeMap;

use utoipa::{OpenApi, ToSchema};

#[derive(ToSchema)]
pub struct KeyValueDoc {
    pub key: String,
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
}

#[derive(ToSchema)]
pub struct MessageDoc { pub message: String }

#[derive(ToSchema)]
pub struct ErrorDoc { pub error: String }

#[derive(ToSchema)]
pub struct BadKeyListDoc {
    pub error: String,
    pub error_by_key: BTreeMap<String, String>,
}

#[derive(ToSchema)]
pub struct UnfoundKeysDoc {
    pub error: String,
    pub unfound_keys: Vec<String>,
}

#[derive(ToSchema)]
pub struct StatusDoc {
    pub version: String,
    pub build: String,
    pub store_connection: bool,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::keys::get_value,
        crate::routes::keys::put_value,
        crate::routes::keys::delete_value,
        crate::routes::keys::list_values,
        crate::routes::keys::put_values,
        crate::routes::keys::find_values,
        crate::routes::blobs::fetch_blob,
        crate::routes::status::status,
    ),
    components(
        schemas(KeyValueDoc, MessageDoc, ErrorDoc, BadKeyListDoc, UnfoundKeysDoc, StatusDoc)
    ),
    tags(
        (name = "user-keys", description = "Per-user JSON key/value storage"),
        (name = "status")
    )
)]
pub struct ApiDoc;
