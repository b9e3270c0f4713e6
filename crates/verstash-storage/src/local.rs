use crate::keys::{join_url, validate_bucket_name, validate_key};
use crate::traits::{Bucket, ByteSink, ByteStream, StorageError, StorageProvider, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage: every bucket is a sub-directory of `base_path`
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for all buckets (e.g., "/var/lib/app/files")
    /// * `base_url` - Base URL for serving files (e.g., "http://localhost:8080/files")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    fn bucket_path(&self, name: &str) -> StorageResult<PathBuf> {
        validate_bucket_name(name)?;
        Ok(self.base_path.join(name))
    }
}

#[async_trait]
impl StorageProvider for LocalStorage {
    async fn has_bucket(&self, name: &str) -> StorageResult<bool> {
        let path = self.bucket_path(name)?;
        Ok(fs::metadata(&path)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false))
    }

    async fn add_bucket(&self, name: &str) -> StorageResult<()> {
        let path = self.bucket_path(name)?;
        fs::create_dir_all(&path).await.map_err(|e| {
            StorageError::BackendError(format!(
                "Failed to create bucket directory {}: {}",
                path.display(),
                e
            ))
        })?;

        tracing::info!(bucket = %name, path = %path.display(), "Local bucket created");
        Ok(())
    }

    async fn get_bucket(&self, name: &str) -> StorageResult<Arc<dyn Bucket>> {
        if !self.has_bucket(name).await? {
            return Err(StorageError::BucketNotFound(name.to_string()));
        }

        Ok(Arc::new(LocalBucket {
            name: name.to_string(),
            base_path: self.bucket_path(name)?,
            base_url: self.base_url.clone(),
        }))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

/// Bucket stored as a directory on the local filesystem
#[derive(Clone, Debug)]
pub struct LocalBucket {
    name: String,
    base_path: PathBuf,
    base_url: String,
}

impl LocalBucket {
    /// Convert storage key to filesystem path with security validation
    ///
    /// Rejects keys that would resolve outside the bucket directory.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;

        let path = self.base_path.join(key);

        let base_canonical = self.base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize bucket path: {}", e))
        })?;

        if let Ok(canonical) = path.canonicalize() {
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside bucket directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Bucket for LocalBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn copy_file_in(&self, source: &Path, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;

        if !fs::try_exists(source).await.unwrap_or(false) {
            tracing::warn!(
                bucket = %self.name,
                source = %source.display(),
                "Local storage copy-in skipped: source file does not exist"
            );
            return Ok(false);
        }

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let size = fs::copy(source, &path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to copy {} to {}: {}",
                source.display(),
                path.display(),
                e
            ))
        })?;

        tracing::info!(
            bucket = %self.name,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage copy-in successful"
        );

        Ok(true)
    }

    async fn copy_file_out(&self, key: &str, destination: &Path) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(false);
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::copy(&path, destination).await.map_err(|e| {
            StorageError::DownloadFailed(format!(
                "Failed to copy {} to {}: {}",
                path.display(),
                destination.display(),
                e
            ))
        })?;

        tracing::debug!(
            bucket = %self.name,
            key = %key,
            destination = %destination.display(),
            "Local storage copy-out successful"
        );

        Ok(true)
    }

    async fn delete_file(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(false);
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            bucket = %self.name,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(true)
    }

    async fn file_exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn get_file_content(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(key.to_string()));
        }

        fs::read(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })
    }

    async fn save_file_content(&self, key: &str, data: Vec<u8>) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            bucket = %self.name,
            key = %key,
            size_bytes = size,
            "Local storage write successful"
        );

        Ok(true)
    }

    async fn open_read_stream(&self, key: &str) -> StorageResult<ByteStream> {
        let path = self.key_to_path(key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(key.to_string()));
        }

        let file = fs::File::open(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to open file {}: {}", path.display(), e))
        })?;

        let stream = tokio_util::io::ReaderStream::new(file).map(|result| {
            result.map_err(|e| StorageError::DownloadFailed(format!("Failed to read chunk: {}", e)))
        });

        Ok(Box::pin(stream))
    }

    async fn open_write_stream(&self, key: &str) -> StorageResult<ByteSink> {
        let path = self.key_to_path(key)?;
        self.ensure_parent_dir(&path).await?;

        let file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        Ok(Box::pin(file))
    }

    fn file_url(&self, key: &str) -> String {
        join_url(&self.base_url, &self.name, key)
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn bucket(dir: &Path) -> Arc<dyn Bucket> {
        let storage = LocalStorage::new(dir, "http://localhost:8080/files".to_string())
            .await
            .unwrap();
        storage.add_bucket("test").await.unwrap();
        storage.get_bucket("test").await.unwrap()
    }

    #[tokio::test]
    async fn test_bucket_lifecycle() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:8080/files".to_string())
            .await
            .unwrap();

        assert!(!storage.has_bucket("avatars").await.unwrap());
        assert!(matches!(
            storage.get_bucket("avatars").await,
            Err(StorageError::BucketNotFound(_))
        ));

        storage.add_bucket("avatars").await.unwrap();
        assert!(storage.has_bucket("avatars").await.unwrap());
        assert_eq!(storage.get_bucket("avatars").await.unwrap().name(), "avatars");
    }

    #[tokio::test]
    async fn test_copy_in_and_out() {
        let dir = tempdir().unwrap();
        let source_dir = tempdir().unwrap();
        let bucket = bucket(dir.path()).await;

        let source = source_dir.path().join("source.txt");
        fs::write(&source, b"test data").await.unwrap();

        assert!(bucket.copy_file_in(&source, "1/1/1_1.txt").await.unwrap());
        assert!(bucket.file_exists("1/1/1_1.txt").await.unwrap());
        assert_eq!(bucket.get_file_content("1/1/1_1.txt").await.unwrap(), b"test data");

        let destination = source_dir.path().join("out/copy.txt");
        assert!(bucket.copy_file_out("1/1/1_1.txt", &destination).await.unwrap());
        assert_eq!(fs::read(&destination).await.unwrap(), b"test data");

        assert!(!bucket.copy_file_out("missing.txt", &destination).await.unwrap());
    }

    #[tokio::test]
    async fn test_copy_in_missing_source() {
        let dir = tempdir().unwrap();
        let bucket = bucket(dir.path()).await;

        let copied = bucket
            .copy_file_in(&dir.path().join("nope.txt"), "nope.txt")
            .await
            .unwrap();
        assert!(!copied);
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let bucket = bucket(dir.path()).await;

        let result = bucket.get_file_content("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = bucket.delete_file("../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = bucket.file_exists("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_delete_nonexistent() {
        let dir = tempdir().unwrap();
        let bucket = bucket(dir.path()).await;

        assert!(!bucket.delete_file("nonexistent/file.txt").await.unwrap());

        bucket.save_file_content("a.txt", b"x".to_vec()).await.unwrap();
        assert!(bucket.delete_file("a.txt").await.unwrap());
        assert!(!bucket.file_exists("a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_streams() {
        use tokio::io::AsyncWriteExt;

        let dir = tempdir().unwrap();
        let bucket = bucket(dir.path()).await;

        let mut sink = bucket.open_write_stream("nested/stream.txt").await.unwrap();
        sink.write_all(b"stream test data").await.unwrap();
        sink.shutdown().await.unwrap();

        let mut stream = bucket.open_read_stream("nested/stream.txt").await.unwrap();
        let mut downloaded = Vec::new();
        while let Some(chunk) = stream.next().await {
            downloaded.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(downloaded, b"stream test data");
    }

    #[tokio::test]
    async fn test_file_url() {
        let dir = tempdir().unwrap();
        let bucket = bucket(dir.path()).await;

        assert_eq!(
            bucket.file_url("4/5/54321_1.png"),
            "http://localhost:8080/files/test/4/5/54321_1.png"
        );
    }
}
