//! Oversized list/find responses are parked in a blob store and the caller is
//! redirected to them.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::KvError;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist `body` and return the URL it can be fetched from.
    async fn put(&self, body: Vec<u8>) -> Result<String, KvError>;
}

/// How long an offloaded response stays readable unless configured otherwise.
pub const DEFAULT_BLOB_EXPIRATION: Duration = Duration::from_secs(3600);

/// Blobs as `<uuid>.json` files under one directory, served back by the HTTP layer.
///
/// A blob older than the expiration is never served again and is removed the
/// next time it is read or swept.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
    public_base_url: String,
    expiration: Duration,
}

fn is_blob_name(name: &str) -> bool {
    name.strip_suffix(".json")
        .is_some_and(|id| id.len() == 36 && Uuid::parse_str(id).is_ok())
}

impl FileBlobStore {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self { dir: dir.into(), public_base_url: public_base_url.into(), expiration: DEFAULT_BLOB_EXPIRATION }
    }

    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = expiration;
        self
    }

    async fn is_expired(&self, path: &Path) -> io::Result<bool> {
        let modified = tokio::fs::metadata(path).await?.modified()?;
        Ok(SystemTime::now().duration_since(modified).is_ok_and(|age| age >= self.expiration))
    }

    /// Contents of blob `name`, or `None` when it is unknown or expired.
    pub async fn open(&self, name: &str) -> Result<Option<Vec<u8>>, KvError> {
        if !is_blob_name(name) {
            return Ok(None);
        }
        let path = self.dir.join(name);
        let unreadable = |e: io::Error| {
            error!(path = %path.display(), error = %e, "cannot read blob");
            KvError::DataStoreQuery("Unable to read staged response.".into())
        };
        match self.is_expired(&path).await {
            Ok(false) => {}
            Ok(true) => {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %e, "cannot remove expired blob");
                }
                info!(blob = name, "expired blob refused");
                return Ok(None);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(unreadable(e)),
        }
        match tokio::fs::read(&path).await {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(unreadable(e)),
        }
    }

    /// Delete every expired blob; returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let Ok(mut entries) = tokio::fs::read_dir(&self.dir).await else { return 0 };
        let mut removed = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if !entry.file_name().to_str().is_some_and(is_blob_name) {
                continue;
            }
            if matches!(self.is_expired(&path).await, Ok(true)) && tokio::fs::remove_file(&path).await.is_ok() {
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, dir = %self.dir.display(), "expired blobs removed");
        }
        removed
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn put(&self, body: Vec<u8>) -> Result<String, KvError> {
        self.sweep_expired().await;
        let name = format!("{}.json", Uuid::new_v4());
        let path = self.dir.join(&name);
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            error!(dir = %self.dir.display(), error = %e, "cannot create blob directory");
            KvError::DataStoreQuery("Unable to stage large response.".into())
        })?;
        tokio::fs::write(&path, &body).await.map_err(|e| {
            error!(path = %path.display(), error = %e, "cannot write blob");
            KvError::DataStoreQuery("Unable to stage large response.".into())
        })?;
        Ok(format!("{}/{}", self.public_base_url.trim_end_matches('/'), name))
    }
}

/// What to send back for a serialized response body.
#[derive(Debug, PartialEq, Eq)]
pub enum Prepared {
    Inline(Vec<u8>),
    Redirect { location: String },
}

#[derive(Clone)]
pub struct LargeResponseOffload {
    store: Arc<dyn BlobStore>,
    threshold: usize,
}

impl LargeResponseOffload {
    pub fn new(store: Arc<dyn BlobStore>, threshold: usize) -> Self {
        Self { store, threshold }
    }

    /// Bodies larger than the threshold go to the blob store.
    pub async fn prepare(&self, body: Vec<u8>) -> Result<Prepared, KvError> {
        if body.len() <= self.threshold {
            return Ok(Prepared::Inline(body));
        }
        let size = body.len();
        let location = self.store.put(body).await?;
        info!(size, threshold = self.threshold, %location, "response offloaded");
        Ok(Prepared::Redirect { location })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn small_bodies_stay_inline() {
        let dir = std::env::temp_dir().join(format!("ukv_offload_{}", Uuid::new_v4()));
        let off = LargeResponseOffload::new(Arc::new(FileBlobStore::new(&dir, "http://localhost/blobs")), 8);
        assert_eq!(off.prepare(b"[1,2,3]".to_vec()).await.unwrap(), Prepared::Inline(b"[1,2,3]".to_vec()));
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn large_bodies_redirect_to_written_blob() {
        let dir = std::env::temp_dir().join(format!("ukv_offload_{}", Uuid::new_v4()));
        let off = LargeResponseOffload::new(Arc::new(FileBlobStore::new(&dir, "http://localhost/blobs/")), 4);
        let body = br#"[{"key":"a","value":1}]"#.to_vec();
        let Prepared::Redirect { location } = off.prepare(body.clone()).await.unwrap() else {
            panic!("expected redirect");
        };
        assert!(location.starts_with("http://localhost/blobs/"));
        let name = location.rsplit('/').next().unwrap();
        assert_eq!(tokio::fs::read(dir.join(name)).await.unwrap(), body);
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn fresh_blob_can_be_opened() {
        let dir = std::env::temp_dir().join(format!("ukv_offload_{}", Uuid::new_v4()));
        let store = FileBlobStore::new(&dir, "/blobs");
        let location = store.put(b"[1]".to_vec()).await.unwrap();
        let name = location.rsplit('/').next().unwrap();
        assert_eq!(store.open(name).await.unwrap(), Some(b"[1]".to_vec()));
        assert_eq!(store.open("../secrets.json").await.unwrap(), None);
        assert_eq!(store.open(&format!("{}.json", Uuid::new_v4())).await.unwrap(), None);
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn expired_blob_is_refused_and_removed() {
        let dir = std::env::temp_dir().join(format!("ukv_offload_{}", Uuid::new_v4()));
        let store = FileBlobStore::new(&dir, "/blobs").with_expiration(Duration::ZERO);
        let location = store.put(b"[1]".to_vec()).await.unwrap();
        let name = location.rsplit('/').next().unwrap();
        assert_eq!(store.open(name).await.unwrap(), None);
        assert!(!dir.join(name).exists());
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_blobs() {
        let dir = std::env::temp_dir().join(format!("ukv_offload_{}", Uuid::new_v4()));
        let keep = FileBlobStore::new(&dir, "/blobs");
        keep.put(b"[1]".to_vec()).await.unwrap();
        tokio::fs::write(dir.join("notes.txt"), b"x").await.unwrap();
        assert_eq!(keep.sweep_expired().await, 0);

        let expire = FileBlobStore::new(&dir, "/blobs").with_expiration(Duration::ZERO);
        assert_eq!(expire.sweep_expired().await, 1);
        assert!(dir.join("notes.txt").exists());
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
