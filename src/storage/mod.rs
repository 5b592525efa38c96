//! Object storage for uploaded videos.
//!
//! Objects live in a bucket under `B3CG/{record id}.{ext}` and are served
//! publicly from `/storage/v1/object/public/{bucket}/{key}`.

mod error;
mod local;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

pub use error::StorageError;
pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;

/// Folder inside the bucket that holds every uploaded video.
pub const VIDEO_FOLDER: &str = "B3CG";

/// Route prefix under which stored objects are publicly readable.
pub const PUBLIC_OBJECT_PREFIX: &str = "/storage/v1/object/public";

const DEFAULT_EXTENSION: &str = "bin";

#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Stores `data` at `bucket/key`. Existing objects are never overwritten.
    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<(), StorageError>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError>;
}

#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<(), StorageError> {
        (**self).put_object(bucket, key, data).await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        (**self).get_object(bucket, key).await
    }
}

/// Lower-cased extension of `file_name`, if it has one.
pub fn file_extension(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Object key for a video record, e.g. `B3CG/<id>.mp4`.
///
/// The extension comes from the first name that has one; `bin` otherwise.
pub fn video_object_key(id: &str, file_names: &[&str]) -> String {
    let ext = file_names
        .iter()
        .find_map(|name| file_extension(name))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    format!("{}/{}.{}", VIDEO_FOLDER, id, ext)
}

pub fn public_url(base_url: &str, bucket: &str, key: &str) -> String {
    format!(
        "{}{}/{}/{}",
        base_url.trim_end_matches('/'),
        PUBLIC_OBJECT_PREFIX,
        bucket,
        key
    )
}

/// Inverse of [`public_url`]: the object key inside `bucket`, if `url` points there.
pub fn key_from_public_url(url: &str, bucket: &str) -> Option<String> {
    let marker = format!("{}/{}/", PUBLIC_OBJECT_PREFIX, bucket);
    let (_, key) = url.split_once(&marker)?;
    let key = key.split(['?', '#']).next().unwrap_or_default();
    (!key.is_empty()).then(|| key.to_string())
}
