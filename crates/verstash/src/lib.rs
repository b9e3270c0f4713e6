//! Verstash
//!
//! Versioned file storage for database records. A [`FileBehavior`] keeps one
//! file per record; a [`TransformFileBehavior`] keeps a set of named variants
//! derived from each uploaded source (thumbnails, previews, conversions).
//!
//! Storage keys are deterministic: for a record with primary key `54321`,
//! version 7 of its `thumb` variant is stored as `4/5/54321_thumb_7.png` under
//! the default `{^^pk}/{^pk}` sub-directory template.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use verstash::{FileBehavior, FileBehaviorSettings, MemoryRecord};
//! use verstash_storage::MemoryStorage;
//!
//! # async fn run() -> Result<(), verstash::FileError> {
//! let behavior = FileBehavior::new(
//!     FileBehaviorSettings::default(),
//!     Arc::new(MemoryStorage::default()),
//! );
//! let mut record = MemoryRecord::new("app::Document").with_attribute("id", 12i64);
//!
//! behavior.save_file(&mut record, "/tmp/report.pdf", None).await?;
//! let url = behavior.file_url(&record).await?;
//! # Ok(())
//! # }
//! ```

pub mod behavior;
pub mod bucket;
pub mod error;
pub mod naming;
pub mod template;
pub mod transformations;
pub mod version;

// Re-export commonly used types
pub use behavior::{
    FileBehavior, FileSource, RecordFileHooks, SaveReport, TransformFileBehavior, VariantOutcome,
};
pub use bucket::{default_bucket_name, BucketResolver, BucketTarget};
pub use error::{FileError, FileResult};
pub use naming::{ExtensionRule, FileNamer, TransformationExtensions};
pub use template::SubDirTemplate;
pub use transformations::{Transformation, TransformationSet};
pub use version::VersionTracker;

pub use verstash_core::{
    DefaultUrl, FileBehaviorSettings, MemoryRecord, MemoryUploadIntake, Record, UploadIntake,
    UploadedFile,
};
pub use verstash_processing::{CopyTransformer, FileTransformer, FnTransformer};
#[cfg(feature = "image")]
pub use verstash_processing::ImageResizeTransformer;
