use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Longest key name accepted, in characters.
pub const MAX_KEY_LEN: usize = 50;
/// Most entries accepted by one batch upsert or named lookup.
pub const MAX_BATCH_ENTRIES: usize = 1000;

/// Transport-neutral view of an inbound request: only what the worker reads.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    pub content_type: Option<String>,
    pub authorization: Option<String>,
    pub body: Vec<u8>,
}

impl InboundRequest {
    pub fn new(content_type: Option<String>, authorization: Option<String>, body: impl Into<Vec<u8>>) -> Self {
        Self { content_type, authorization, body: body.into() }
    }

    /// Request with `application/json` content type and the given body.
    pub fn json(body: impl Into<Vec<u8>>) -> Self {
        Self { content_type: Some("application/json".into()), authorization: None, body: body.into() }
    }

    pub fn with_bearer(mut self, token: &str) -> Self {
        self.authorization = Some(format!("Bearer {token}"));
        self
    }

    /// Bearer token from the authorization header; scheme match ignores case.
    pub fn bearer_token(&self) -> Option<&str> {
        let raw = self.authorization.as_deref()?.trim();
        let (scheme, token) = raw.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let token = token.trim();
        (!token.is_empty()).then_some(token)
    }
}

/// One stored entry as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: Value,
}

impl From<models::user_key_value::Model> for KeyValue {
    fn from(m: models::user_key_value::Model) -> Self {
        Self { key: m.key_name, value: m.key_value }
    }
}
