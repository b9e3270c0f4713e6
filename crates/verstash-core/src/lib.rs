//! Verstash Core Library
//!
//! This crate provides the domain contracts, error types and configuration
//! shared by every Verstash component: the record/attribute contract the file
//! behaviors read from and persist to, the upload intake contract, and the
//! storage/behavior settings.

pub mod config;
pub mod error;
pub mod record;
pub mod storage_types;
pub mod telemetry;
pub mod upload;

// Re-export commonly used types
pub use config::{DefaultUrl, FileBehaviorSettings, StorageConfig};
pub use error::RecordError;
pub use record::{AttributeMap, AttributeValue, MemoryRecord, PrimaryKey, Record};
pub use storage_types::StorageBackend;
pub use upload::{upload_field_name, MemoryUploadIntake, UploadError, UploadIntake, UploadedFile};
