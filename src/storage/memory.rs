use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;

use super::{ObjectStore, StorageError};

/// In-memory [`ObjectStore`] used by tests and local experiments.
///
/// Writes can be denied wholesale to simulate a bucket without upload rights.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<Mutex<HashMap<String, Bytes>>>,
    max_object_bytes: Option<u64>,
    deny_writes: bool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(mut self, max_object_bytes: u64) -> Self {
        self.max_object_bytes = Some(max_object_bytes);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.deny_writes = true;
        self
    }

    pub async fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .lock()
            .await
            .contains_key(&format!("{}/{}", bucket, key))
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.lock().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<(), StorageError> {
        let object = format!("{}/{}", bucket, key);
        if self.deny_writes {
            return Err(StorageError::PermissionDenied(object));
        }
        if let Some(limit) = self.max_object_bytes {
            let size = data.len() as u64;
            if size > limit {
                return Err(StorageError::QuotaExceeded { size, limit });
            }
        }

        let mut objects = self.objects.lock().await;
        if objects.contains_key(&object) {
            return Err(StorageError::AlreadyExists(object));
        }
        objects.insert(object, data);
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        let object = format!("{}/{}", bucket, key);
        self.objects
            .lock()
            .await
            .get(&object)
            .cloned()
            .ok_or(StorageError::NotFound(object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_only_store_denies_uploads() {
        let store = MemoryObjectStore::new().read_only();
        let err = store
            .put_object("videos", "B3CG/a.mp4", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::PermissionDenied(_)));
        assert!(store.is_empty().await);
    }
}
