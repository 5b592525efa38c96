use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ObjectStore, StorageError};

/// Stores objects as files under `<root>/<bucket>/<key>`.
#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    root: PathBuf,
    max_object_bytes: Option<u64>,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, max_object_bytes: Option<u64>) -> Self {
        Self {
            root: root.into(),
            max_object_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(bucket).join(key);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if !safe || bucket.is_empty() || key.is_empty() {
            return Err(StorageError::InvalidKey(format!("{}/{}", bucket, key)));
        }
        Ok(self.root.join(relative))
    }
}

fn map_io(err: std::io::Error, object: &str) -> StorageError {
    match err.kind() {
        ErrorKind::AlreadyExists => StorageError::AlreadyExists(object.to_string()),
        ErrorKind::PermissionDenied => StorageError::PermissionDenied(object.to_string()),
        ErrorKind::NotFound => StorageError::NotFound(object.to_string()),
        _ => StorageError::Io(err),
    }
}

/// Hidden sibling the bytes are written to before the object appears.
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.part", name, Uuid::new_v4()))
}

// The final key only ever appears fully written; hard_link refuses an existing target.
async fn stage_and_publish(staging: &Path, path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(staging)
        .await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::hard_link(staging, path).await
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<(), StorageError> {
        let object = format!("{}/{}", bucket, key);
        if let Some(limit) = self.max_object_bytes {
            let size = data.len() as u64;
            if size > limit {
                return Err(StorageError::QuotaExceeded { size, limit });
            }
        }

        let path = self.resolve(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| map_io(e, &object))?;
        }

        let staging = staging_path(&path);
        let published = stage_and_publish(&staging, &path, &data).await;
        if let Err(e) = tokio::fs::remove_file(&staging).await {
            if e.kind() != ErrorKind::NotFound {
                warn!("Could not remove staging file {}: {}", staging.display(), e);
            }
        }
        published.map_err(|e| map_io(e, &object))?;

        debug!("Stored {} bytes at {}", data.len(), path.display());
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        let object = format!("{}/{}", bucket, key);
        let path = self.resolve(bucket, key)?;
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| map_io(e, &object))?;
        Ok(Bytes::from(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), None);

        store
            .put_object("videos", "B3CG/abc.mp4", Bytes::from_static(b"frames"))
            .await
            .unwrap();

        let data = store.get_object("videos", "B3CG/abc.mp4").await.unwrap();
        assert_eq!(&data[..], b"frames");
        assert!(dir.path().join("videos/B3CG/abc.mp4").exists());
    }

    #[tokio::test]
    async fn refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), None);
        store
            .put_object("videos", "B3CG/abc.mp4", Bytes::from_static(b"one"))
            .await
            .unwrap();

        let err = store
            .put_object("videos", "B3CG/abc.mp4", Bytes::from_static(b"two"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));

        let data = store.get_object("videos", "B3CG/abc.mp4").await.unwrap();
        assert_eq!(&data[..], b"one");
    }

    fn leftover_files(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn conflicting_put_leaves_no_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), None);
        store
            .put_object("videos", "B3CG/abc.mp4", Bytes::from_static(b"one"))
            .await
            .unwrap();
        store
            .put_object("videos", "B3CG/abc.mp4", Bytes::from_static(b"two"))
            .await
            .unwrap_err();

        assert_eq!(
            leftover_files(&dir.path().join("videos/B3CG")),
            vec!["abc.mp4".to_string()]
        );
    }

    #[tokio::test]
    async fn failed_write_never_creates_the_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), None);
        let path = store.resolve("videos", "B3CG/abc.mp4").unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();

        // Staging inside a missing directory fails before anything is published
        let staging = path.parent().unwrap().join("missing").join(".abc.mp4.part");
        stage_and_publish(&staging, &path, b"partial")
            .await
            .unwrap_err();
        assert!(!path.exists());

        store
            .put_object("videos", "B3CG/abc.mp4", Bytes::from_static(b"whole"))
            .await
            .unwrap();
        let data = store.get_object("videos", "B3CG/abc.mp4").await.unwrap();
        assert_eq!(&data[..], b"whole");
    }

    #[tokio::test]
    async fn enforces_object_quota() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), Some(4));

        let err = store
            .put_object("videos", "B3CG/big.mp4", Bytes::from_static(b"12345"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::QuotaExceeded { size: 5, limit: 4 }
        ));
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), None);

        let err = store
            .put_object("videos", "../escape.mp4", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }
}
