//! Per-user JSON key/value storage.

pub mod domain;
pub mod identity;
pub mod keys;
pub mod offload;
pub mod payload;
pub mod statements;
pub mod worker;

pub use crate::errors::KvError;
pub use domain::{InboundRequest, KeyValue, MAX_BATCH_ENTRIES, MAX_KEY_LEN};
pub use identity::{IdentityRejection, IdentityResolver, JwtIdentityResolver, StaticIdentityResolver};
pub use offload::{BlobStore, FileBlobStore, LargeResponseOffload, Prepared, DEFAULT_BLOB_EXPIRATION};
pub use worker::PersistenceWorker;
