use std::collections::BTreeMap;

use thiserror::Error;

use crate::ukv::identity::IdentityRejection;
use crate::ukv::keys::KeyRule;

/// Failures of the key/value worker.
///
/// Variants carry structured data; turning them into HTTP responses happens in
/// the server crate.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("{}", .rule.describe(.key))]
    KeyFormat { key: String, rule: KeyRule },
    #[error("{0}")]
    ValueFormat(String),
    #[error("{0}")]
    RequestFormat(String),
    #[error("Errors were found for {} of the key strings submitted.", .errors.len())]
    BadKeyList { errors: BTreeMap<String, String> },
    #[error("{0}")]
    KeyNotFound(String),
    #[error("Keys were not found for {} of the key strings submitted.", .missing.len())]
    RequestedKeysNotFound { missing: Vec<String> },
    #[error("{0}")]
    DataStoreQuery(String),
    #[error("{0}")]
    Worker(String),
    #[error("{}", .0.message)]
    Identity(IdentityRejection),
}

impl KvError {
    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            KvError::Configuration(_) => 2001,
            KvError::KeyFormat { .. } => 2101,
            KvError::ValueFormat(_) => 2102,
            KvError::RequestFormat(_) => 2103,
            KvError::BadKeyList { .. } => 2104,
            KvError::KeyNotFound(_) => 2201,
            KvError::RequestedKeysNotFound { .. } => 2202,
            KvError::DataStoreQuery(_) => 2301,
            KvError::Worker(_) => 2302,
            KvError::Identity(_) => 2401,
        }
    }

    /// Client-side problems: bad key, bad body, bad content type.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            KvError::KeyFormat { .. } | KvError::ValueFormat(_) | KvError::RequestFormat(_) | KvError::BadKeyList { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, KvError::KeyNotFound(_) | KvError::RequestedKeysNotFound { .. })
    }
}
