use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use verstash_core::{AttributeMap, FileBehaviorSettings, Record, UploadIntake, UploadedFile};
use verstash_storage::{Bucket, StorageProvider, StorageResult};

use crate::bucket::{BucketResolver, BucketTarget};
use crate::error::{FileError, FileResult};
use crate::naming::FileNamer;
use crate::template::SubDirTemplate;
use crate::version::VersionTracker;

/// File handed to a save operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// Plain local file; kept after saving unless deletion is requested
    Path(PathBuf),
    /// Transient upload artifact; removed after a successful save by default
    Upload(UploadedFile),
}

impl FileSource {
    /// Local file holding the bytes
    pub fn path(&self) -> &Path {
        match self {
            FileSource::Path(path) => path,
            FileSource::Upload(file) => &file.temp_path,
        }
    }

    /// Lower-cased extension of the source file name
    pub fn extension(&self) -> String {
        match self {
            FileSource::Path(path) => path
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase())
                .unwrap_or_default(),
            FileSource::Upload(file) => file.extension(),
        }
    }

    pub fn is_upload(&self) -> bool {
        matches!(self, FileSource::Upload(_))
    }
}

impl From<PathBuf> for FileSource {
    fn from(path: PathBuf) -> Self {
        FileSource::Path(path)
    }
}

impl From<&Path> for FileSource {
    fn from(path: &Path) -> Self {
        FileSource::Path(path.to_path_buf())
    }
}

impl From<&str> for FileSource {
    fn from(path: &str) -> Self {
        FileSource::Path(PathBuf::from(path))
    }
}

impl From<UploadedFile> for FileSource {
    fn from(file: UploadedFile) -> Self {
        FileSource::Upload(file)
    }
}

/// State shared by the single-file and transformation behaviors
pub(crate) struct BehaviorCore {
    pub(crate) settings: FileBehaviorSettings,
    pub(crate) namer: FileNamer,
    pub(crate) bucket: BucketResolver,
    intake: Option<Arc<dyn UploadIntake>>,
    uploaded_file: Option<UploadedFile>,
}

impl BehaviorCore {
    pub(crate) fn new(
        settings: FileBehaviorSettings,
        provider: Option<Arc<dyn StorageProvider>>,
        target: BucketTarget,
    ) -> Self {
        let sub_dir = settings
            .sub_dir_template
            .as_deref()
            .filter(|template| !template.is_empty())
            .map(SubDirTemplate::parse);

        let namer = FileNamer::new(
            sub_dir,
            settings.file_attribute.clone(),
            settings.extension_attribute.clone(),
            VersionTracker::new(settings.version_attribute.clone()),
        );

        Self {
            settings,
            namer,
            bucket: BucketResolver::new(provider, target),
            intake: None,
            uploaded_file: None,
        }
    }

    pub(crate) fn set_intake(&mut self, intake: Arc<dyn UploadIntake>) {
        self.intake = Some(intake);
    }

    pub(crate) async fn bucket(&self, record: &dyn Record) -> FileResult<Arc<dyn Bucket>> {
        self.bucket.resolve(record).await
    }

    pub(crate) fn default_url(&self, variant: Option<&str>) -> Option<&str> {
        self.settings
            .default_url
            .as_ref()
            .and_then(|default_url| default_url.for_variant(variant))
    }

    /// URL of `key`, or the configured default when the file is missing
    pub(crate) async fn url_or_default(
        &self,
        bucket: &dyn Bucket,
        key: &str,
        variant: Option<&str>,
    ) -> FileResult<String> {
        if let Some(default_url) = self.default_url(variant) {
            if !bucket.file_exists(key).await? {
                return Ok(default_url.to_string());
            }
        }
        Ok(bucket.file_url(key))
    }

    pub(crate) fn supports_field(&self, name: &str) -> bool {
        name == self.settings.file_attribute
    }

    pub(crate) async fn uploaded_file(&mut self) -> Option<&UploadedFile> {
        if self.uploaded_file.is_none() {
            self.uploaded_file = self.fetch_upload().await;
        }
        self.uploaded_file.as_ref()
    }

    pub(crate) fn set_uploaded_file(&mut self, file: Option<UploadedFile>) {
        self.uploaded_file = file;
    }

    pub(crate) async fn set_uploaded_path(&mut self, path: &Path) -> FileResult<()> {
        self.uploaded_file = Some(UploadedFile::from_path(path).await?);
        Ok(())
    }

    /// Forget the attached upload and the tabular index
    pub(crate) fn reset_upload(&mut self) {
        self.uploaded_file = None;
        self.settings.tabular_index = None;
    }

    async fn fetch_upload(&self) -> Option<UploadedFile> {
        if !self.settings.auto_fetch_upload {
            return None;
        }

        let intake = self.intake.as_ref()?;
        let file = intake.fetch(&self.settings.file_attribute, self.settings.tabular_index)?;

        // A valid upload whose artifact is gone has already been consumed
        if !file.has_error() && !tokio::fs::try_exists(&file.temp_path).await.unwrap_or(false) {
            tracing::debug!(
                field = %self.settings.file_attribute,
                temp_path = %file.temp_path.display(),
                "Uploaded file already processed"
            );
            return None;
        }

        Some(file)
    }

    /// Remove the source after a successful save when requested, or when it
    /// was an upload artifact and no explicit choice was made
    pub(crate) async fn release_source(&self, source: &FileSource, delete_source: Option<bool>) {
        if !delete_source.unwrap_or_else(|| source.is_upload()) {
            return;
        }

        match tokio::fs::remove_file(source.path()).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                source = %source.path().display(),
                error = %e,
                "Failed to remove source file"
            ),
        }
    }

    /// Store the version/extension pair of the file just saved
    pub(crate) async fn persist(
        &self,
        record: &mut dyn Record,
        version: u64,
        extension: &str,
    ) -> FileResult<()> {
        let mut values = AttributeMap::new();
        values.insert(self.settings.version_attribute.clone(), version.into());
        values.insert(self.settings.extension_attribute.clone(), extension.into());
        record.update_attributes(values).await?;
        Ok(())
    }

    /// Create the staging directory, failing as a configuration error
    pub(crate) async fn ensure_temp_dir(&self) -> FileResult<&Path> {
        let temp_dir = self.settings.temp_dir.as_path();
        tokio::fs::create_dir_all(temp_dir).await.map_err(|e| {
            FileError::Configuration(format!(
                "Unable to create temporary directory {}: {}",
                temp_dir.display(),
                e
            ))
        })?;
        Ok(temp_dir)
    }
}

/// Delete `key` if present; a missing file counts as deleted
pub(crate) async fn delete_if_exists(bucket: &dyn Bucket, key: &str) -> StorageResult<bool> {
    if bucket.file_exists(key).await? {
        bucket.delete_file(key).await
    } else {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_extension_is_lowercased() {
        let source = FileSource::from("/tmp/Report.PDF");
        assert_eq!(source.extension(), "pdf");
        assert!(!source.is_upload());

        let source = FileSource::from(UploadedFile::new("photo.JPG", "/tmp/upload-1"));
        assert_eq!(source.extension(), "jpg");
        assert_eq!(source.path(), Path::new("/tmp/upload-1"));
        assert!(source.is_upload());
    }

    #[tokio::test]
    async fn test_release_source_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let core = BehaviorCore::new(FileBehaviorSettings::default(), None, BucketTarget::Default);

        let plain = dir.path().join("plain.txt");
        std::fs::write(&plain, b"x").unwrap();
        core.release_source(&FileSource::from(plain.as_path()), None).await;
        assert!(plain.exists());

        core.release_source(&FileSource::from(plain.as_path()), Some(true)).await;
        assert!(!plain.exists());

        let upload = dir.path().join("upload.tmp");
        std::fs::write(&upload, b"x").unwrap();
        let source = FileSource::Upload(UploadedFile::new("a.txt", &upload));
        core.release_source(&source, None).await;
        assert!(!upload.exists());
    }

    #[tokio::test]
    async fn test_consumed_upload_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let intake = Arc::new(verstash_core::MemoryUploadIntake::new());
        let mut core =
            BehaviorCore::new(FileBehaviorSettings::default(), None, BucketTarget::Default);
        core.set_intake(intake.clone());

        intake.submit("file", None, UploadedFile::new("a.txt", dir.path().join("gone")));
        assert!(core.uploaded_file().await.is_none());

        let present = dir.path().join("present");
        std::fs::write(&present, b"x").unwrap();
        intake.submit("file", None, UploadedFile::new("a.txt", &present));
        assert_eq!(core.uploaded_file().await.unwrap().temp_path, present);
    }
}
