use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use uuid::Uuid;
use verstash_core::{FileBehaviorSettings, Record, UploadIntake, UploadedFile};
use verstash_processing::{FileTransformer, TransformSettings};
use verstash_storage::{Bucket, ByteSink, ByteStream, StorageProvider};

use super::common::{delete_if_exists, BehaviorCore, FileSource};
use crate::bucket::BucketTarget;
use crate::error::{FileError, FileResult};
use crate::naming::TransformationExtensions;
use crate::template::SubDirTemplate;
use crate::transformations::TransformationSet;

/// Result of saving one variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantOutcome {
    pub name: String,
    pub key: String,
    pub stored: bool,
    /// Error that prevented storing, if the variant failed with one
    pub error: Option<String>,
}

/// Per-variant result of a multi-variant save
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    pub version: u64,
    pub extension: String,
    pub outcomes: Vec<VariantOutcome>,
}

impl SaveReport {
    /// Whether every variant was stored
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.stored)
    }

    pub fn failed(&self) -> impl Iterator<Item = &VariantOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.stored)
    }
}

/// Keeps a set of named variants per record, all derived from one source.
///
/// Variants are stored as `{sub_dir}/{pk}_{name}_{version}.{extension}` and
/// share a version. Variants with settings are produced by the configured
/// [`FileTransformer`] in a staging directory first; the others are copies of
/// the source.
pub struct TransformFileBehavior {
    core: BehaviorCore,
    transformations: TransformationSet,
    transformer: Arc<dyn FileTransformer>,
    default_transformation: Option<String>,
}

impl TransformFileBehavior {
    pub fn new(
        settings: FileBehaviorSettings,
        storage: Arc<dyn StorageProvider>,
        transformations: TransformationSet,
        transformer: Arc<dyn FileTransformer>,
    ) -> Self {
        let target = BucketTarget::from(settings.bucket.clone());
        Self {
            core: BehaviorCore::new(settings, Some(storage), target),
            transformations,
            transformer,
            default_transformation: None,
        }
    }

    pub fn with_bucket(
        settings: FileBehaviorSettings,
        bucket: Arc<dyn Bucket>,
        transformations: TransformationSet,
        transformer: Arc<dyn FileTransformer>,
    ) -> Self {
        Self {
            core: BehaviorCore::new(settings, None, BucketTarget::Handle(bucket)),
            transformations,
            transformer,
            default_transformation: None,
        }
    }

    pub fn with_upload_intake(mut self, intake: Arc<dyn UploadIntake>) -> Self {
        self.core.set_intake(intake);
        self
    }

    pub fn with_sub_dir(mut self, sub_dir: Option<SubDirTemplate>) -> Self {
        self.core.namer.set_sub_dir(sub_dir);
        self
    }

    /// Remap the extension of selected variants
    pub fn with_extensions(mut self, extensions: TransformationExtensions) -> Self {
        self.core.namer.set_extensions(Some(extensions));
        self
    }

    pub fn settings(&self) -> &FileBehaviorSettings {
        &self.core.settings
    }

    pub fn transformations(&self) -> &TransformationSet {
        &self.transformations
    }

    pub fn set_default_transformation(&mut self, name: Option<String>) {
        self.default_transformation = name;
    }

    /// Variant used when an operation names none: the explicitly set one,
    /// otherwise the first configured transformation
    pub fn default_transformation(&self) -> FileResult<&str> {
        let transformations = self.ensure_transformations()?;
        match self.default_transformation.as_deref() {
            Some(name) if !name.is_empty() => Ok(name),
            _ => transformations
                .first()
                .map(|t| t.name.as_str())
                .ok_or_else(empty_set_error),
        }
    }

    fn ensure_transformations(&self) -> FileResult<&TransformationSet> {
        if self.transformations.is_empty() {
            return Err(empty_set_error());
        }
        Ok(&self.transformations)
    }

    fn variant_name<'a>(&'a self, variant: Option<&'a str>) -> FileResult<&'a str> {
        self.ensure_transformations()?;
        match variant {
            Some(name) => Ok(name),
            None => self.default_transformation(),
        }
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
        variant: Option<&str>,
        version: Option<u64>,
        extension: Option<&str>,
    ) -> FileResult<String> {
        let name = self.variant_name(variant)?;
        Ok(self.core.namer.self_name(record, Some(name), version, extension))
    }

    pub fn file_full_name(
        &self,
        record: &dyn Record,
        variant: Option<&str>,
        version: Option<u64>,
        extension: Option<&str>,
    ) -> FileResult<String> {
        let name = self.variant_name(variant)?;
        Ok(self.core.namer.full_name(record, Some(name), version, extension))
    }

    /// Replace every variant of the record's file with ones derived from `source`
    pub async fn save_file(
        &self,
        record: &mut dyn Record,
        source: impl Into<FileSource>,
        delete_source: Option<bool>,
    ) -> FileResult<bool> {
        let report = self.save_file_detailed(record, source, delete_source).await?;
        Ok(report.is_success())
    }

    /// Save every variant and report how each one went.
    ///
    /// All variants are attempted even after a failure. The record's version
    /// and extension are updated only when every variant was stored; variants
    /// stored before a failure stay in the bucket.
    pub async fn save_file_detailed(
        &self,
        record: &mut dyn Record,
        source: impl Into<FileSource>,
        delete_source: Option<bool>,
    ) -> FileResult<SaveReport> {
        let source = source.into();
        let transformations = self.ensure_transformations()?;

        for transformation in transformations {
            if let Some(settings) = &transformation.settings {
                self.transformer.validate_settings(settings)?;
            }
        }

        let temp_dir = if transformations.iter().any(|t| !t.is_verbatim()) {
            Some(self.core.ensure_temp_dir().await?)
        } else {
            None
        };

        if !self.delete_file(&*record).await? {
            tracing::warn!("Not every previous variant could be deleted");
        }

        let version = self.next_file_version(&*record);
        let extension = source.extension();
        let bucket = self.bucket(&*record).await?;
        let start = Instant::now();

        let mut outcomes = Vec::with_capacity(transformations.len());
        for transformation in transformations {
            let name = transformation.name.as_str();
            let key = self
                .core
                .namer
                .full_name(&*record, Some(name), Some(version), Some(&extension));

            let result = match (&transformation.settings, temp_dir) {
                (Some(settings), Some(temp_dir)) => {
                    self.store_transformed(bucket.as_ref(), source.path(), &key, settings, temp_dir)
                        .await
                }
                _ => bucket
                    .copy_file_in(source.path(), &key)
                    .await
                    .map_err(FileError::from),
            };

            let outcome = match result {
                Ok(stored) => {
                    if !stored {
                        tracing::warn!(
                            bucket = %bucket.name(),
                            key = %key,
                            transformation = %name,
                            "Variant was not stored"
                        );
                    }
                    VariantOutcome {
                        name: name.to_string(),
                        key,
                        stored,
                        error: None,
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        bucket = %bucket.name(),
                        key = %key,
                        transformation = %name,
                        error = %e,
                        "Variant failed"
                    );
                    VariantOutcome {
                        name: name.to_string(),
                        key,
                        stored: false,
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let report = SaveReport {
            version,
            extension,
            outcomes,
        };

        if report.is_success() {
            self.core.release_source(&source, delete_source).await;
            self.core.persist(record, version, &report.extension).await?;

            tracing::info!(
                bucket = %bucket.name(),
                version,
                variants = report.outcomes.len(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "File variants saved"
            );
        } else {
            tracing::warn!(
                bucket = %bucket.name(),
                version,
                failed = report.failed().count(),
                "File variants partially saved; record left unchanged"
            );
        }

        Ok(report)
    }

    /// Run the transformer into a staging file, then copy the result in.
    /// The staging file is removed whatever the outcome.
    async fn store_transformed(
        &self,
        bucket: &dyn Bucket,
        source: &Path,
        key: &str,
        settings: &TransformSettings,
        temp_dir: &Path,
    ) -> FileResult<bool> {
        let file_name = key.rsplit('/').next().unwrap_or(key);
        let staged = temp_dir.join(format!("{}_{}", Uuid::new_v4().simple(), file_name));

        let result = self
            .transform_and_copy(bucket, source, &staged, key, settings)
            .await;

        if tokio::fs::try_exists(&staged).await.unwrap_or(false) {
            if let Err(e) = tokio::fs::remove_file(&staged).await {
                tracing::warn!(
                    path = %staged.display(),
                    error = %e,
                    "Failed to remove staged file"
                );
            }
        }

        result
    }

    async fn transform_and_copy(
        &self,
        bucket: &dyn Bucket,
        source: &Path,
        staged: &Path,
        key: &str,
        settings: &TransformSettings,
    ) -> FileResult<bool> {
        if !self.transformer.transform(source, staged, settings).await? {
            return Ok(false);
        }
        Ok(bucket.copy_file_in(staged, key).await?)
    }

    /// Delete every variant of the current file.
    ///
    /// Missing variants count as deleted. Failures are logged and reported
    /// as `false` once every variant was attempted.
    pub async fn delete_file(&self, record: &dyn Record) -> FileResult<bool> {
        let transformations = self.ensure_transformations()?;
        let bucket = self.bucket(record).await?;

        let mut result = true;
        for transformation in transformations {
            let key = self
                .core
                .namer
                .full_name(record, Some(&transformation.name), None, None);

            let deleted = match delete_if_exists(bucket.as_ref(), &key).await {
                Ok(deleted) => deleted,
                Err(e) => {
                    tracing::warn!(
                        bucket = %bucket.name(),
                        key = %key,
                        transformation = %transformation.name,
                        error = %e,
                        "Variant delete failed"
                    );
                    false
                }
            };
            result = result && deleted;
        }

        Ok(result)
    }

    pub async fn file_exists(
        &self,
        record: &dyn Record,
        variant: Option<&str>,
    ) -> FileResult<bool> {
        let key = self.file_full_name(record, variant, None, None)?;
        let bucket = self.bucket(record).await?;
        Ok(bucket.file_exists(&key).await?)
    }

    pub async fn file_content(
        &self,
        record: &dyn Record,
        variant: Option<&str>,
    ) -> FileResult<Vec<u8>> {
        let key = self.file_full_name(record, variant, None, None)?;
        let bucket = self.bucket(record).await?;
        Ok(bucket.get_file_content(&key).await?)
    }

    /// Public URL of a variant, or its default URL when the file is missing
    pub async fn file_url(
        &self,
        record: &dyn Record,
        variant: Option<&str>,
    ) -> FileResult<String> {
        let key = self.file_full_name(record, variant, None, None)?;
        let bucket = self.bucket(record).await?;
        self.core.url_or_default(bucket.as_ref(), &key, variant).await
    }

    pub async fn open_file_read(
        &self,
        record: &dyn Record,
        variant: Option<&str>,
    ) -> FileResult<ByteStream> {
        let key = self.file_full_name(record, variant, None, None)?;
        let bucket = self.bucket(record).await?;
        Ok(bucket.open_read_stream(&key).await?)
    }

    pub async fn open_file_write(
        &self,
        record: &dyn Record,
        variant: Option<&str>,
    ) -> FileResult<ByteSink> {
        let key = self.file_full_name(record, variant, None, None)?;
        let bucket = self.bucket(record).await?;
        Ok(bucket.open_write_stream(&key).await?)
    }

    /// Rebuild every variant from one stored variant.
    ///
    /// The source variant is copied out to the staging directory and saved
    /// again, so the version goes up by one. Returns `false` when the source
    /// variant does not exist.
    pub async fn regenerate_file_transformations(
        &self,
        record: &mut dyn Record,
        source_variant: Option<&str>,
    ) -> FileResult<bool> {
        let name = self.variant_name(source_variant)?.to_string();
        let key = self.core.namer.full_name(&*record, Some(&name), None, None);
        let temp_dir = self.core.ensure_temp_dir().await?;

        let extension = self.core.namer.current_extension(&*record);
        let mut file_name = format!("{}_regenerate", Uuid::new_v4().simple());
        if !extension.is_empty() {
            file_name = format!("{}.{}", file_name, extension);
        }
        let temp_file = temp_dir.join(file_name);

        let bucket = self.bucket(&*record).await?;
        if !bucket.copy_file_out(&key, &temp_file).await? {
            tracing::warn!(
                bucket = %bucket.name(),
                key = %key,
                transformation = %name,
                "Source variant missing; nothing to regenerate"
            );
            return Ok(false);
        }

        tracing::debug!(bucket = %bucket.name(), transformation = %name, "Regenerating variants");
        let result = self
            .save_file(record, FileSource::Path(temp_file.clone()), Some(true))
            .await;

        if tokio::fs::try_exists(&temp_file).await.unwrap_or(false) {
            if let Err(e) = tokio::fs::remove_file(&temp_file).await {
                tracing::warn!(
                    path = %temp_file.display(),
                    error = %e,
                    "Failed to remove temporary file"
                );
            }
        }

        result
    }

    pub fn supports_field(&self, name: &str) -> bool {
        self.core.supports_field(name)
    }

    pub async fn uploaded_file(&mut self) -> Option<&UploadedFile> {
        self.core.uploaded_file().await
    }

    pub fn set_uploaded_file(&mut self, file: Option<UploadedFile>) {
        self.core.set_uploaded_file(file);
    }

    pub async fn set_uploaded_path(&mut self, path: impl AsRef<Path>) -> FileResult<()> {
        self.core.set_uploaded_path(path.as_ref()).await
    }

    /// Save the attached upload after the record was inserted or updated.
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

    pub async fn before_delete(&self, record: &dyn Record) -> FileResult<bool> {
        self.delete_file(record).await
    }
}

fn empty_set_error() -> FileError {
    FileError::Configuration("File transformations list is empty".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformations::Transformation;
    use verstash_core::MemoryRecord;
    use verstash_processing::CopyTransformer;
    use verstash_storage::{MemoryStorage, StorageProvider};

    fn behavior(transformations: TransformationSet) -> TransformFileBehavior {
        TransformFileBehavior::new(
            FileBehaviorSettings::default(),
            Arc::new(MemoryStorage::default()),
            transformations,
            Arc::new(CopyTransformer),
        )
    }

    #[test]
    fn test_default_transformation() {
        let mut behavior = behavior(TransformationSet::new(vec![
            Transformation::verbatim("full"),
            Transformation::verbatim("thumb"),
        ]));
        assert_eq!(behavior.default_transformation().unwrap(), "full");

        behavior.set_default_transformation(Some("thumb".into()));
        assert_eq!(behavior.default_transformation().unwrap(), "thumb");

        behavior.set_default_transformation(Some(String::new()));
        assert_eq!(behavior.default_transformation().unwrap(), "full");
    }

    #[tokio::test]
    async fn test_empty_set_is_configuration_error() {
        let storage = Arc::new(MemoryStorage::default());
        let behavior = TransformFileBehavior::new(
            FileBehaviorSettings::default(),
            storage.clone(),
            TransformationSet::default(),
            Arc::new(CopyTransformer),
        );
        let mut record = MemoryRecord::new("app::Item").with_attribute("id", 1i64);

        assert!(matches!(
            behavior.delete_file(&record).await,
            Err(FileError::Configuration(_))
        ));
        assert!(matches!(
            behavior.save_file(&mut record, "/tmp/whatever.txt", None).await,
            Err(FileError::Configuration(_))
        ));
        assert!(matches!(
            behavior.file_full_name(&record, None, None, None),
            Err(FileError::Configuration(_))
        ));

        // Naming a variant explicitly does not bypass the check
        assert!(matches!(
            behavior.file_exists(&record, Some("thumb")).await,
            Err(FileError::Configuration(_))
        ));
        assert!(matches!(
            behavior.file_url(&record, Some("thumb")).await,
            Err(FileError::Configuration(_))
        ));
        assert!(matches!(
            behavior.file_content(&record, Some("thumb")).await,
            Err(FileError::Configuration(_))
        ));
        assert!(behavior.open_file_read(&record, Some("thumb")).await.is_err());
        assert!(behavior.open_file_write(&record, Some("thumb")).await.is_err());
        assert!(matches!(
            behavior.regenerate_file_transformations(&mut record, Some("thumb")).await,
            Err(FileError::Configuration(_))
        ));
        assert!(!storage.has_bucket("item").await.unwrap());
    }

    #[test]
    fn test_variant_names() {
        let behavior = behavior(TransformationSet::new(vec![
            Transformation::verbatim("origin"),
            Transformation::verbatim("main"),
        ]));
        let record = MemoryRecord::new("app::Item")
            .with_attribute("id", 54321i64)
            .with_attribute("file_version", 1i64)
            .with_attribute("file_extension", "jpg");

        assert_eq!(
            behavior.file_full_name(&record, None, None, None).unwrap(),
            "4/5/54321_origin_1.jpg"
        );
        assert_eq!(
            behavior.file_self_name(&record, Some("main"), Some(2), None).unwrap(),
            "54321_main_2.jpg"
        );
    }

    #[test]
    fn test_report_success() {
        let outcome = |name: &str, stored| VariantOutcome {
            name: name.into(),
            key: format!("{}.txt", name),
            stored,
            error: None,
        };
        let report = SaveReport {
            version: 1,
            extension: "txt".into(),
            outcomes: vec![outcome("a", true), outcome("b", false)],
        };
        assert!(!report.is_success());
        assert_eq!(report.failed().map(|o| o.name.as_str()).collect::<Vec<_>>(), ["b"]);
    }
}
