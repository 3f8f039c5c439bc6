use serde::{Deserialize, Serialize};

/// Body of `GET /status`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StatusReport {
    pub version: String,
    pub build: String,
    pub store_connection: bool,
}

/// `{"message": ...}` confirmation body returned by write endpoints.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}
