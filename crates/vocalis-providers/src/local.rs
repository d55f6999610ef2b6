//! Object store backed by a local directory, for offline runs and tests.

use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use uuid::Uuid;
use vocalis_abstraction::{ContainerStatus, ObjectMetadata, ObjectStore, StoreError};

const META_SUFFIX: &str = ".meta.json";

/// The container is a directory under `root`; each object is a file and its
/// metadata lives in a `<object>.meta.json` sidecar.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    container: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self { root: root.into(), container: container.into() }
    }

    pub fn container_dir(&self) -> PathBuf {
        self.root.join(&self.container)
    }

    /// Resolves a key to a path inside the container; keys may not escape it.
    pub fn object_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && !key.ends_with(META_SUFFIX)
            && relative.components().all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StoreError::Rejected { status: 400, message: format!("invalid object key {key:?}") });
        }
        Ok(self.container_dir().join(relative))
    }

    fn metadata_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(META_SUFFIX);
        PathBuf::from(name)
    }
}

fn io_error(e: &std::io::Error, context: &str) -> StoreError {
    let message = format!("{context}: {e}");
    match e.kind() {
        ErrorKind::NotFound => StoreError::NotFound(message),
        ErrorKind::PermissionDenied => StoreError::PermissionDenied(message),
        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut => StoreError::Transient(message),
        _ => StoreError::Other(message),
    }
}

/// Writes through a uniquely named temp file so readers never see a partial file.
async fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(format!(".{}.tmp", Uuid::new_v4().simple()));
    let tmp = PathBuf::from(tmp);

    if let Err(e) = tokio::fs::write(&tmp, contents).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    tokio::fs::rename(&tmp, path).await
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn container(&self) -> &str {
        &self.container
    }

    async fn create_container(&self) -> Result<ContainerStatus, StoreError> {
        let dir = self.container_dir();
        if tokio::fs::metadata(&dir).await.is_ok_and(|m| m.is_dir()) {
            return Ok(ContainerStatus::AlreadyExists);
        }
        tokio::fs::create_dir_all(&dir).await.map_err(|e| io_error(&e, "create container"))?;
        debug!(dir = %dir.display(), "Created local container");
        Ok(ContainerStatus::Created)
    }

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        metadata: &ObjectMetadata,
    ) -> Result<(), StoreError> {
        let path = self.object_path(key)?;
        let context = format!("put {key}");
        let meta = serde_json::to_vec_pretty(metadata).map_err(|e| StoreError::Other(format!("{context}: {e}")))?;

        write_atomic(&path, &body).await.map_err(|e| io_error(&e, &context))?;
        write_atomic(&Self::metadata_path(&path), &meta).await.map_err(|e| io_error(&e, &context))?;
        Ok(())
    }

    async fn object_metadata(&self, key: &str) -> Result<ObjectMetadata, StoreError> {
        let path = self.object_path(key)?;
        let context = format!("head {key}");
        tokio::fs::metadata(&path).await.map_err(|e| io_error(&e, &context))?;

        match tokio::fs::read(Self::metadata_path(&path)).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| StoreError::Other(format!("{context}: {e}"))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(ObjectMetadata::new()),
            Err(e) => Err(io_error(&e, &context)),
        }
    }

    fn object_url(&self, key: &str) -> String {
        let dir = std::path::absolute(self.container_dir()).unwrap_or_else(|_| self.container_dir());
        format!("file://{}/{key}", dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vocalis_abstraction::DIGEST_METADATA_KEY;

    #[tokio::test]
    async fn test_create_container_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp.path(), "voice-samples");

        assert_eq!(store.create_container().await.unwrap(), ContainerStatus::Created);
        assert_eq!(store.create_container().await.unwrap(), ContainerStatus::AlreadyExists);
        assert!(temp.path().join("voice-samples").is_dir());
    }

    #[tokio::test]
    async fn test_put_then_read_metadata() {
        let temp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp.path(), "voice-samples");
        let metadata = ObjectMetadata::from([(DIGEST_METADATA_KEY.to_string(), "abc".to_string())]);

        store.put_object("audio/a.wav", Bytes::from_static(b"RIFF"), &metadata).await.unwrap();

        let path = temp.path().join("voice-samples/audio/a.wav");
        assert_eq!(std::fs::read(&path).unwrap(), b"RIFF");
        assert_eq!(store.object_metadata("audio/a.wav").await.unwrap(), metadata);

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|n| n.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_object() {
        let temp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp.path(), "c");
        store.put_object("k", Bytes::from_static(b"one"), &ObjectMetadata::new()).await.unwrap();
        store.put_object("k", Bytes::from_static(b"two"), &ObjectMetadata::new()).await.unwrap();
        assert_eq!(std::fs::read(temp.path().join("c/k")).unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp.path(), "c");
        let err = store.object_metadata("nope.wav").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_keys_cannot_escape_container() {
        let temp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp.path(), "c");
        for key in ["../outside", "/etc/passwd", "", "a/../../b", "x.meta.json"] {
            let err = store.put_object(key, Bytes::new(), &ObjectMetadata::new()).await.unwrap_err();
            assert!(matches!(err, StoreError::Rejected { status: 400, .. }), "{key}");
        }
    }

    #[test]
    fn test_object_url() {
        let store = LocalObjectStore::new("/data/store", "voice-samples");
        assert_eq!(store.object_url("dataset.json"), "file:///data/store/voice-samples/dataset.json");
    }
}
