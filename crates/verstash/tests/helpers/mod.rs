#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use verstash::{FileBehaviorSettings, FnTransformer, MemoryRecord, Record};
use verstash_core::{AttributeMap, AttributeValue, PrimaryKey, RecordError};
use verstash_processing::TransformError;
use verstash_storage::{
    Bucket, ByteSink, ByteStream, LocalStorage, MemoryStorage, StorageError, StorageProvider,
    StorageResult,
};

/// Scratch directories and a storage backend for one test
pub struct TestEnv {
    pub storage: Arc<dyn StorageProvider>,
    pub settings: FileBehaviorSettings,
    pub _temp_dir: TempDir,
    sources: PathBuf,
}

impl TestEnv {
    /// Write a source file and return its path
    pub fn source_file(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.sources.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn staging_dir(&self) -> &Path {
        &self.settings.temp_dir
    }

    pub async fn bucket(&self, name: &str) -> Arc<dyn Bucket> {
        self.storage.get_bucket(name).await.unwrap()
    }
}

fn setup(temp_dir: TempDir, storage: Arc<dyn StorageProvider>) -> TestEnv {
    let sources = temp_dir.path().join("sources");
    std::fs::create_dir_all(&sources).unwrap();

    let settings = FileBehaviorSettings {
        temp_dir: temp_dir.path().join("staging"),
        ..FileBehaviorSettings::default()
    };

    TestEnv {
        storage,
        settings,
        _temp_dir: temp_dir,
        sources,
    }
}

/// Environment backed by in-memory storage
pub fn setup_memory_env() -> TestEnv {
    let temp_dir = tempfile::tempdir().unwrap();
    setup(temp_dir, Arc::new(MemoryStorage::new("http://files.test")))
}

/// Environment backed by local disk storage under a temp directory
pub async fn setup_local_env() -> TestEnv {
    let temp_dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(
        temp_dir.path().join("storage"),
        "http://localhost:8080/files".to_string(),
    )
    .await
    .unwrap();

    setup(temp_dir, Arc::new(storage))
}

/// Record of type `app::models::Item` with the given id
pub fn item(id: i64) -> MemoryRecord {
    MemoryRecord::new("app::models::Item").with_attribute("id", id)
}

/// Transformer appending the `suffix` setting to the source content, and
/// failing when the settings contain `"fail": true`
pub fn suffix_transformer() -> FnTransformer {
    FnTransformer::new(|source, destination, settings| {
        if settings["fail"].as_bool().unwrap_or(false) {
            return Err(TransformError::Task("forced failure".to_string()));
        }
        let mut content = std::fs::read(source)?;
        content.extend_from_slice(settings["suffix"].as_str().unwrap_or_default().as_bytes());
        std::fs::write(destination, content)?;
        Ok(true)
    })
}

/// Bucket failing copy-in and delete for keys containing `fragment`,
/// delegating everything else to `inner`
pub struct FailingBucket {
    pub inner: Arc<dyn Bucket>,
    fragment: String,
}

impl FailingBucket {
    pub fn new(inner: Arc<dyn Bucket>, fragment: &str) -> Self {
        Self {
            inner,
            fragment: fragment.to_string(),
        }
    }

    fn check(&self, key: &str) -> StorageResult<()> {
        if key.contains(&self.fragment) {
            return Err(StorageError::BackendError(format!("permission denied: {}", key)));
        }
        Ok(())
    }
}

#[async_trait]
impl Bucket for FailingBucket {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn copy_file_in(&self, source: &Path, key: &str) -> StorageResult<bool> {
        self.check(key)?;
        self.inner.copy_file_in(source, key).await
    }

    async fn copy_file_out(&self, key: &str, destination: &Path) -> StorageResult<bool> {
        self.inner.copy_file_out(key, destination).await
    }

    async fn delete_file(&self, key: &str) -> StorageResult<bool> {
        self.check(key)?;
        self.inner.delete_file(key).await
    }

    async fn file_exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.file_exists(key).await
    }

    async fn get_file_content(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.inner.get_file_content(key).await
    }

    async fn save_file_content(&self, key: &str, data: Vec<u8>) -> StorageResult<bool> {
        self.inner.save_file_content(key, data).await
    }

    async fn open_read_stream(&self, key: &str) -> StorageResult<ByteStream> {
        self.inner.open_read_stream(key).await
    }

    async fn open_write_stream(&self, key: &str) -> StorageResult<ByteSink> {
        self.inner.open_write_stream(key).await
    }

    fn file_url(&self, key: &str) -> String {
        self.inner.file_url(key)
    }
}

/// Record whose attribute updates are always rejected by the record layer
pub struct ReadOnlyRecord(pub MemoryRecord);

#[async_trait]
impl Record for ReadOnlyRecord {
    fn type_name(&self) -> &str {
        self.0.type_name()
    }

    fn primary_key(&self) -> PrimaryKey {
        self.0.primary_key()
    }

    fn attribute(&self, name: &str) -> Option<AttributeValue> {
        self.0.attribute(name)
    }

    async fn update_attributes(&mut self, _values: AttributeMap) -> Result<(), RecordError> {
        Err(RecordError::Persistence(anyhow::anyhow!("record is read-only")))
    }
}
