use std::sync::Arc;

use sea_orm::DatabaseConnection;
use service::ukv::{
    FileBlobStore, IdentityResolver, JwtIdentityResolver, KvError, LargeResponseOffload, PersistenceWorker,
    StaticIdentityResolver,
};
use tracing::warn;

/// Shared handler state; cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub worker: Arc<PersistenceWorker>,
    pub offload: Option<LargeResponseOffload>,
    /// Serves offloaded responses back at `/blobs/{name}`.
    pub blobs: Option<Arc<FileBlobStore>>,
    pub status: configs::StatusConfig,
}

impl AppState {
    pub fn new(worker: PersistenceWorker, offload: Option<LargeResponseOffload>, status: configs::StatusConfig) -> Self {
        Self { worker: Arc::new(worker), offload, blobs: None, status }
    }

    pub fn with_blob_store(mut self, blobs: Arc<FileBlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    /// Wire resolver, worker and offload from validated configuration.
    pub fn from_config(db: DatabaseConnection, cfg: &configs::AppConfig) -> Result<Self, KvError> {
        let identity = identity_resolver(&cfg.auth)?;
        let blobs = cfg.offload.enabled.then(|| {
            Arc::new(
                FileBlobStore::new(&cfg.offload.dir, &cfg.offload.public_base_url)
                    .with_expiration(cfg.offload.url_expiration()),
            )
        });
        let offload = blobs
            .clone()
            .map(|store| LargeResponseOffload::new(store, cfg.offload.threshold_bytes()));
        let state = Self::new(PersistenceWorker::new(db, identity), offload, cfg.status.clone());
        Ok(match blobs {
            Some(blobs) => state.with_blob_store(blobs),
            None => state,
        })
    }
}

pub fn identity_resolver(auth: &configs::AuthConfig) -> Result<Arc<dyn IdentityResolver>, KvError> {
    if let Some(identity) = &auth.static_identity {
        warn!(identity = %identity, "static identity in use; every request acts as this user");
        return Ok(Arc::new(StaticIdentityResolver::new(identity.clone())));
    }
    if auth.jwt_secret.trim().is_empty() {
        return Err(KvError::Configuration("auth.jwt_secret is required".into()));
    }
    Ok(Arc::new(JwtIdentityResolver::new(
        &auth.jwt_secret,
        auth.issuer.as_deref(),
        auth.audience.as_deref(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolver_requires_secret_or_static_identity() {
        assert!(identity_resolver(&configs::AuthConfig::default()).is_err());
        let cfg = configs::AuthConfig { static_identity: Some("dev".into()), ..Default::default() };
        assert!(identity_resolver(&cfg).is_ok());
        let cfg = configs::AuthConfig { jwt_secret: "s3cret".into(), ..Default::default() };
        assert!(identity_resolver(&cfg).is_ok());
    }
}
