use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use verstash_core::{FileBehaviorSettings, Record, UploadIntake, UploadedFile};
use verstash_storage::{Bucket, ByteSink, ByteStream, StorageProvider};

use super::common::{delete_if_exists, BehaviorCore, FileSource};
use crate::bucket::BucketTarget;
use crate::error::FileResult;
use crate::template::SubDirTemplate;

/// Keeps one versioned file per record.
///
/// Files are stored as `{sub_dir}/{pk}_{version}.{extension}`. Every save
/// removes the current file, stores the new one under the next version and
/// records the version and extension on the record.
pub struct FileBehavior {
    core: BehaviorCore,
}

impl FileBehavior {
    /// Behavior storing files in a bucket provisioned from `storage`
    pub fn new(settings: FileBehaviorSettings, storage: Arc<dyn StorageProvider>) -> Self {
        let target = BucketTarget::from(settings.bucket.clone());
        Self {
            core: BehaviorCore::new(settings, Some(storage), target),
        }
    }

    /// Behavior storing files in an already resolved bucket
    pub fn with_bucket(settings: FileBehaviorSettings, bucket: Arc<dyn Bucket>) -> Self {
        Self {
            core: BehaviorCore::new(settings, None, BucketTarget::Handle(bucket)),
        }
    }

    pub fn with_upload_intake(mut self, intake: Arc<dyn UploadIntake>) -> Self {
        self.core.set_intake(intake);
        self
    }

    /// Override the configured sub-directory template
    pub fn with_sub_dir(mut self, sub_dir: Option<SubDirTemplate>) -> Self {
        self.core.namer.set_sub_dir(sub_dir);
        self
    }

    pub fn settings(&self) -> &FileBehaviorSettings {
        &self.core.settings
    }

    pub async fn bucket(&self, record: &dyn Record) -> FileResult<Arc<dyn Bucket>> {
        self.core.bucket(record).await
    }

    pub fn current_file_version(&self, record: &dyn Record) -> u64 {
        self.core.namer.version().current(record)
    }

    pub fn next_file_version(&self, record: &dyn Record) -> u64 {
        self.core.namer.version().next(record)
    }

    pub fn file_self_name(
        &self,
        record: &dyn Record,
        version: Option<u64>,
        extension: Option<&str>,
    ) -> String {
        self.core.namer.self_name(record, None, version, extension)
    }

    pub fn file_full_name(
        &self,
        record: &dyn Record,
        version: Option<u64>,
        extension: Option<&str>,
    ) -> String {
        self.core.namer.full_name(record, None, version, extension)
    }

    /// Replace the record's file with `source`.
    ///
    /// Returns whether the new file landed in the bucket. The record's
    /// version and extension are only updated on success.
    pub async fn save_file(
        &self,
        record: &mut dyn Record,
        source: impl Into<FileSource>,
        delete_source: Option<bool>,
    ) -> FileResult<bool> {
        let source = source.into();
        self.delete_file(&*record).await?;

        let version = self.next_file_version(&*record);
        let extension = source.extension();
        let key = self.file_full_name(&*record, Some(version), Some(&extension));
        let bucket = self.bucket(&*record).await?;

        let start = Instant::now();
        let stored = bucket.copy_file_in(source.path(), &key).await?;

        if !stored {
            tracing::warn!(
                bucket = %bucket.name(),
                key = %key,
                source = %source.path().display(),
                "File was not stored"
            );
            return Ok(false);
        }

        self.core.release_source(&source, delete_source).await;
        self.core.persist(record, version, &extension).await?;

        tracing::info!(
            bucket = %bucket.name(),
            key = %key,
            version,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "File saved"
        );

        Ok(true)
    }

    /// Delete the current file; succeeds when there is none
    pub async fn delete_file(&self, record: &dyn Record) -> FileResult<bool> {
        let bucket = self.bucket(record).await?;
        let key = self.file_full_name(record, None, None);
        Ok(delete_if_exists(bucket.as_ref(), &key).await?)
    }

    pub async fn file_exists(&self, record: &dyn Record) -> FileResult<bool> {
        let bucket = self.bucket(record).await?;
        Ok(bucket.file_exists(&self.file_full_name(record, None, None)).await?)
    }

    pub async fn file_content(&self, record: &dyn Record) -> FileResult<Vec<u8>> {
        let bucket = self.bucket(record).await?;
        Ok(bucket
            .get_file_content(&self.file_full_name(record, None, None))
            .await?)
    }

    /// Public URL of the current file, or the default URL when it is missing
    pub async fn file_url(&self, record: &dyn Record) -> FileResult<String> {
        let bucket = self.bucket(record).await?;
        let key = self.file_full_name(record, None, None);
        self.core.url_or_default(bucket.as_ref(), &key, None).await
    }

    pub async fn open_file_read(&self, record: &dyn Record) -> FileResult<ByteStream> {
        let bucket = self.bucket(record).await?;
        Ok(bucket
            .open_read_stream(&self.file_full_name(record, None, None))
            .await?)
    }

    /// Writer replacing the content of the current file in place
    pub async fn open_file_write(&self, record: &dyn Record) -> FileResult<ByteSink> {
        let bucket = self.bucket(record).await?;
        Ok(bucket
            .open_write_stream(&self.file_full_name(record, None, None))
            .await?)
    }

    /// Whether `name` is this behavior's virtual upload field
    pub fn supports_field(&self, name: &str) -> bool {
        self.core.supports_field(name)
    }

    /// Attached upload, fetched from the upload intake when none was set
    pub async fn uploaded_file(&mut self) -> Option<&UploadedFile> {
        self.core.uploaded_file().await
    }

    pub fn set_uploaded_file(&mut self, file: Option<UploadedFile>) {
        self.core.set_uploaded_file(file);
    }

    /// Attach a local file as if it had been uploaded
    pub async fn set_uploaded_path(&mut self, path: impl AsRef<Path>) -> FileResult<()> {
        self.core.set_uploaded_path(path.as_ref()).await
    }

    /// Save the attached upload after the record was inserted or updated.
    ///
    /// The attachment is cleared whatever the outcome.
    pub async fn after_save(&mut self, record: &mut dyn Record) -> FileResult<bool> {
        let upload = self.core.uploaded_file().await.cloned();
        let result = match upload {
            Some(file) if !file.has_error() => self.save_file(record, file, None).await,
            _ => Ok(false),
        };
        self.core.reset_upload();
        result
    }

    /// Delete the file of a record about to be deleted
    pub async fn before_delete(&self, record: &dyn Record) -> FileResult<bool> {
        self.delete_file(record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verstash_core::MemoryRecord;
    use verstash_storage::MemoryStorage;

    fn behavior() -> FileBehavior {
        FileBehavior::new(
            FileBehaviorSettings::default(),
            Arc::new(MemoryStorage::default()),
        )
    }

    #[test]
    fn test_supports_field() {
        let behavior = behavior();
        assert!(behavior.supports_field("file"));
        assert!(!behavior.supports_field("image"));
    }

    #[tokio::test]
    async fn test_names_use_record_state() {
        let behavior = behavior();
        let record = MemoryRecord::new("app::Item")
            .with_attribute("id", 54321i64)
            .with_attribute("file_version", 2i64)
            .with_attribute("file_extension", "txt");

        assert_eq!(behavior.file_self_name(&record, None, None), "54321_2.txt");
        assert_eq!(behavior.file_full_name(&record, None, None), "4/5/54321_2.txt");
        assert_eq!(behavior.next_file_version(&record), 3);
    }

    #[tokio::test]
    async fn test_delete_without_file_succeeds() {
        let behavior = behavior();
        let record = MemoryRecord::new("app::Item").with_attribute("id", 1i64);

        assert!(behavior.delete_file(&record).await.unwrap());
        assert!(behavior.delete_file(&record).await.unwrap());
        assert_eq!(behavior.bucket(&record).await.unwrap().name(), "item");
    }
}
