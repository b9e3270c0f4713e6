//! Storage abstraction traits
//!
//! This module defines the [`StorageProvider`] and [`Bucket`] traits that all
//! storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWrite;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Stream of file content chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Writer storing a file; content is stored once the writer is shut down
pub type ByteSink = Pin<Box<dyn AsyncWrite + Send>>;

/// Named container of files addressed by string keys
///
/// Boolean results report whether the operation took effect: copying a missing
/// local source or deleting an absent key yields `Ok(false)`. Errors are
/// reserved for backend failures (permissions, connectivity, invalid keys).
#[async_trait]
pub trait Bucket: Send + Sync {
    /// Bucket name
    fn name(&self) -> &str;

    /// Copy a local file into the bucket under `key`
    async fn copy_file_in(&self, source: &Path, key: &str) -> StorageResult<bool>;

    /// Copy the file stored under `key` out to a local path
    async fn copy_file_out(&self, key: &str, destination: &Path) -> StorageResult<bool>;

    /// Delete the file stored under `key`
    async fn delete_file(&self, key: &str) -> StorageResult<bool>;

    /// Check if a file exists
    async fn file_exists(&self, key: &str) -> StorageResult<bool>;

    /// Read the whole content of a file
    async fn get_file_content(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Store raw bytes under `key`, replacing any existing file
    async fn save_file_content(&self, key: &str, data: Vec<u8>) -> StorageResult<bool>;

    /// Open a file for streaming reads
    async fn open_read_stream(&self, key: &str) -> StorageResult<ByteStream>;

    /// Open a file for writing
    async fn open_write_stream(&self, key: &str) -> StorageResult<ByteSink>;

    /// Public URL of a file
    fn file_url(&self, key: &str) -> String;
}

/// Storage backend owning a set of named buckets
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Check if a bucket exists
    async fn has_bucket(&self, name: &str) -> StorageResult<bool>;

    /// Create a bucket; creating an existing bucket is a no-op
    async fn add_bucket(&self, name: &str) -> StorageResult<()>;

    /// Get a handle to an existing bucket
    async fn get_bucket(&self, name: &str) -> StorageResult<Arc<dyn Bucket>>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
