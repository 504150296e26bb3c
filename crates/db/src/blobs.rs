use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob key `{0}` must be a relative path without `..` segments")]
    InvalidKey(String),
    #[error("blob `{0}` does not exist")]
    NotFound(String),
    #[error("blob io failure at `{path}`: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

/// Binary storage keyed by relative paths. `store_blob` returns the path to record on the
/// owning document.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn store_blob(&self, key: &str, bytes: Vec<u8>) -> Result<String, BlobError>;
    async fn read_blob(&self, path: &str) -> Result<Vec<u8>, BlobError>;
    async fn delete_blob(&self, path: &str) -> Result<(), BlobError>;
}

fn validate_key(key: &str) -> Result<&Path, BlobError> {
    let path = Path::new(key);
    let clean = !key.is_empty()
        && path.components().all(|component| matches!(component, Component::Normal(_)));
    if clean {
        Ok(path)
    } else {
        Err(BlobError::InvalidKey(key.to_string()))
    }
}

pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the root directory and proves it is writable.
    pub async fn ensure_writable(&self) -> Result<(), BlobError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| BlobError::Io { path: self.root.clone(), source })?;
        let probe = self.root.join(".docroute-probe");
        tokio::fs::write(&probe, b"ok")
            .await
            .map_err(|source| BlobError::Io { path: probe.clone(), source })?;
        tokio::fs::remove_file(&probe)
            .await
            .map_err(|source| BlobError::Io { path: probe.clone(), source })
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, BlobError> {
        Ok(self.root.join(validate_key(key)?))
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn store_blob(&self, key: &str, bytes: Vec<u8>) -> Result<String, BlobError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| BlobError::Io { path: parent.to_path_buf(), source })?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| BlobError::Io { path: path.clone(), source })?;
        Ok(key.to_string())
    }

    async fn read_blob(&self, path: &str) -> Result<Vec<u8>, BlobError> {
        let resolved = self.resolve(path)?;
        match tokio::fs::read(&resolved).await {
            Ok(bytes) => Ok(bytes),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(path.to_string()))
            }
            Err(source) => Err(BlobError::Io { path: resolved.clone(), source }),
        }
    }

    async fn delete_blob(&self, path: &str) -> Result<(), BlobError> {
        let resolved = self.resolve(path)?;
        match tokio::fs::remove_file(&resolved).await {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(BlobError::Io { path: resolved.clone(), source }),
        }
    }
}

#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub async fn keys(&self) -> Vec<String> {
        let blobs = self.blobs.read().await;
        let mut keys: Vec<_> = blobs.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn store_blob(&self, key: &str, bytes: Vec<u8>) -> Result<String, BlobError> {
        validate_key(key)?;
        let mut blobs = self.blobs.write().await;
        blobs.insert(key.to_string(), bytes);
        Ok(key.to_string())
    }

    async fn read_blob(&self, path: &str) -> Result<Vec<u8>, BlobError> {
        let blobs = self.blobs.read().await;
        blobs.get(path).cloned().ok_or_else(|| BlobError::NotFound(path.to_string()))
    }

    async fn delete_blob(&self, path: &str) -> Result<(), BlobError> {
        let mut blobs = self.blobs.write().await;
        blobs.remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::{BlobError, BlobStore, FilesystemBlobStore, InMemoryBlobStore};

    #[tokio::test]
    async fn filesystem_store_round_trips_nested_keys() {
        let dir = TempDir::new().expect("temp dir");
        let store = FilesystemBlobStore::new(dir.path().join("blobs"));
        store.ensure_writable().await.expect("root is writable");

        let path = store
            .store_blob("applications/app-1.json", b"{\"ok\":true}".to_vec())
            .await
            .expect("store blob");
        assert_eq!(path, "applications/app-1.json");
        assert!(dir.path().join("blobs/applications/app-1.json").exists());
        assert_eq!(store.read_blob(&path).await.expect("read blob"), b"{\"ok\":true}".to_vec());

        store.delete_blob(&path).await.expect("delete blob");
        assert!(matches!(store.read_blob(&path).await, Err(BlobError::NotFound(_))));
        store.delete_blob(&path).await.expect("deleting twice is fine");
    }

    #[tokio::test]
    async fn keys_escaping_the_root_are_rejected() {
        let dir = TempDir::new().expect("temp dir");
        let store = FilesystemBlobStore::new(dir.path());
        for key in ["../outside.txt", "/etc/passwd", ""] {
            assert!(matches!(
                store.store_blob(key, Vec::new()).await,
                Err(BlobError::InvalidKey(_))
            ));
        }
    }

    #[tokio::test]
    async fn in_memory_store_tracks_keys() {
        let store = InMemoryBlobStore::default();
        store.store_blob("documents/a.txt", b"a".to_vec()).await.expect("store");
        store.store_blob("documents/b.txt", b"b".to_vec()).await.expect("store");
        assert_eq!(store.keys().await, vec!["documents/a.txt", "documents/b.txt"]);

        store.delete_blob("documents/a.txt").await.expect("delete");
        assert_eq!(store.keys().await, vec!["documents/b.txt"]);
    }
}
