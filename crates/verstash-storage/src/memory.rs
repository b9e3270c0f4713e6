//! In-memory storage backend, used by tests and the CLI dry runs

use crate::keys::{join_url, validate_bucket_name, validate_key};
use crate::traits::{Bucket, ByteSink, ByteStream, StorageError, StorageProvider, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};
use tokio::fs;
use tokio::io::AsyncWrite;

type Files = Arc<RwLock<HashMap<String, Bytes>>>;

fn poisoned<T>(_: T) -> StorageError {
    StorageError::BackendError("Memory storage lock poisoned".to_string())
}

#[derive(Clone, Debug)]
pub struct MemoryStorage {
    base_url: String,
    buckets: Arc<RwLock<HashMap<String, Files>>>,
}

impl MemoryStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            buckets: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new("memory://")
    }
}

#[async_trait]
impl StorageProvider for MemoryStorage {
    async fn has_bucket(&self, name: &str) -> StorageResult<bool> {
        validate_bucket_name(name)?;
        Ok(self.buckets.read().map_err(poisoned)?.contains_key(name))
    }

    async fn add_bucket(&self, name: &str) -> StorageResult<()> {
        validate_bucket_name(name)?;
        let mut buckets = self.buckets.write().map_err(poisoned)?;
        if !buckets.contains_key(name) {
            buckets.insert(name.to_string(), Arc::default());
            tracing::info!(bucket = %name, "Memory bucket created");
        }
        Ok(())
    }

    async fn get_bucket(&self, name: &str) -> StorageResult<Arc<dyn Bucket>> {
        validate_bucket_name(name)?;
        let files = self
            .buckets
            .read()
            .map_err(poisoned)?
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::BucketNotFound(name.to_string()))?;

        Ok(Arc::new(MemoryBucket {
            name: name.to_string(),
            base_url: self.base_url.clone(),
            files,
        }))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

/// Bucket holding its files in a shared map; handles to the same bucket see
/// each other's writes.
#[derive(Clone, Debug)]
pub struct MemoryBucket {
    name: String,
    base_url: String,
    files: Files,
}

impl MemoryBucket {
    fn insert(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.files
            .write()
            .map_err(poisoned)?
            .insert(key.to_string(), data);
        Ok(())
    }

    fn lookup(&self, key: &str) -> StorageResult<Option<Bytes>> {
        Ok(self.files.read().map_err(poisoned)?.get(key).cloned())
    }

    /// Keys currently stored, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .files
            .read()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[async_trait]
impl Bucket for MemoryBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn copy_file_in(&self, source: &Path, key: &str) -> StorageResult<bool> {
        validate_key(key)?;

        let data = match fs::read(source).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(StorageError::UploadFailed(e.to_string())),
        };

        let size = data.len();
        self.insert(key, Bytes::from(data))?;
        tracing::debug!(bucket = %self.name, key = %key, size_bytes = size, "Memory copy-in");
        Ok(true)
    }

    async fn copy_file_out(&self, key: &str, destination: &Path) -> StorageResult<bool> {
        validate_key(key)?;

        let Some(data) = self.lookup(key)? else {
            return Ok(false);
        };

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(destination, &data)
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;
        Ok(true)
    }

    async fn delete_file(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        Ok(self.files.write().map_err(poisoned)?.remove(key).is_some())
    }

    async fn file_exists(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        Ok(self.lookup(key)?.is_some())
    }

    async fn get_file_content(&self, key: &str) -> StorageResult<Vec<u8>> {
        validate_key(key)?;
        self.lookup(key)?
            .map(|data| data.to_vec())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn save_file_content(&self, key: &str, data: Vec<u8>) -> StorageResult<bool> {
        validate_key(key)?;
        self.insert(key, Bytes::from(data))?;
        Ok(true)
    }

    async fn open_read_stream(&self, key: &str) -> StorageResult<ByteStream> {
        validate_key(key)?;
        let data = self
            .lookup(key)?
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(Box::pin(futures::stream::once(async move { Ok(data) })))
    }

    async fn open_write_stream(&self, key: &str) -> StorageResult<ByteSink> {
        validate_key(key)?;
        Ok(Box::pin(MemoryWriter {
            key: key.to_string(),
            buffer: Vec::new(),
            files: Arc::clone(&self.files),
        }))
    }

    fn file_url(&self, key: &str) -> String {
        join_url(&self.base_url, &self.name, key)
    }
}

/// Buffers written bytes and publishes them on flush or shutdown
struct MemoryWriter {
    key: String,
    buffer: Vec<u8>,
    files: Files,
}

impl MemoryWriter {
    fn commit(&self) -> io::Result<()> {
        let mut files = self
            .files
            .write()
            .map_err(|_| io::Error::other("memory storage lock poisoned"))?;
        files.insert(self.key.clone(), Bytes::copy_from_slice(&self.buffer));
        Ok(())
    }
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.get_mut().buffer.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(self.commit())
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(self.commit())
    }
}

#[cfg(all(test, feature = "storage-memory"))]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio::io::AsyncWriteExt;

    async fn bucket(storage: &MemoryStorage) -> Arc<dyn Bucket> {
        storage.add_bucket("test").await.unwrap();
        storage.get_bucket("test").await.unwrap()
    }

    #[tokio::test]
    async fn test_handles_share_files() {
        let storage = MemoryStorage::default();
        let first = bucket(&storage).await;
        let second = storage.get_bucket("test").await.unwrap();

        first.save_file_content("a.txt", b"abc".to_vec()).await.unwrap();
        assert!(second.file_exists("a.txt").await.unwrap());
        assert_eq!(second.get_file_content("a.txt").await.unwrap(), b"abc");
    }

    #[tokio::test]
    async fn test_add_bucket_is_idempotent() {
        let storage = MemoryStorage::default();
        let handle = bucket(&storage).await;
        handle.save_file_content("a.txt", b"abc".to_vec()).await.unwrap();

        storage.add_bucket("test").await.unwrap();
        let again = storage.get_bucket("test").await.unwrap();
        assert!(again.file_exists("a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_keys() {
        let storage = MemoryStorage::default();
        let bucket = bucket(&storage).await;

        assert!(!bucket.delete_file("missing").await.unwrap());
        assert!(matches!(
            bucket.get_file_content("missing").await,
            Err(StorageError::NotFound(_))
        ));
        let copied = bucket
            .copy_file_in(Path::new("/definitely/not/here.txt"), "x.txt")
            .await
            .unwrap();
        assert!(!copied);
    }

    #[tokio::test]
    async fn test_write_stream_commits_on_shutdown() {
        let storage = MemoryStorage::default();
        let bucket = bucket(&storage).await;

        let mut sink = bucket.open_write_stream("s.txt").await.unwrap();
        sink.write_all(b"hello ").await.unwrap();
        sink.write_all(b"world").await.unwrap();
        sink.shutdown().await.unwrap();

        let mut stream = bucket.open_read_stream("s.txt").await.unwrap();
        let chunk = stream.next().await.unwrap().unwrap();
        assert_eq!(&chunk[..], b"hello world");
    }

    #[tokio::test]
    async fn test_file_url() {
        let storage = MemoryStorage::new("http://cdn.test/");
        let bucket = bucket(&storage).await;
        assert_eq!(bucket.file_url("1/1_1.txt"), "http://cdn.test/test/1/1_1.txt");
    }
}
