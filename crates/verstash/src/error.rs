//! Error types for the file behaviors

use thiserror::Error;
use verstash_core::RecordError;
use verstash_processing::TransformError;
use verstash_storage::StorageError;

#[derive(Debug, Error)]
pub enum FileError {
    /// Misconfiguration detected before any file was touched
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("Transform error: {0}")]
    Transform(TransformError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TransformError> for FileError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::InvalidSettings(msg) => FileError::Configuration(msg),
            other => FileError::Transform(other),
        }
    }
}

pub type FileResult<T> = Result<T, FileError>;
