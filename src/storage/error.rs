use thiserror::Error;

use crate::errors::CoreError;

/// Errors raised by an [`ObjectStore`](super::ObjectStore).
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object {0} already exists")]
    AlreadyExists(String),

    #[error("Object of {size} bytes exceeds the storage quota of {limit} bytes")]
    QuotaExceeded { size: u64, limit: u64 },

    #[error("Permission denied for object {0}")]
    PermissionDenied(String),

    #[error("Object {0} not found")]
    NotFound(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        let message = err.to_string();
        match err {
            StorageError::AlreadyExists(_) => CoreError::conflict(message),
            StorageError::QuotaExceeded { size, limit } => CoreError::validation(message)
                .with_field("size", size)
                .with_field("limit", limit),
            StorageError::PermissionDenied(_) => CoreError::forbidden(message),
            StorageError::NotFound(key) => CoreError::not_found("object", key),
            StorageError::InvalidKey(_) => CoreError::validation(message),
            StorageError::Io(e) => CoreError::internal("Storage I/O error").with_source(e),
        }
    }
}
