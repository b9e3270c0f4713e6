//! Verstash Storage Library
//!
//! This crate provides the bucket abstraction the file behaviors write
//! through, plus a local filesystem and an in-memory backend.
//!
//! # Layout
//!
//! A [`StorageProvider`] owns named buckets; a [`Bucket`] addresses files by
//! string keys such as `4/5/54321_7.png`. Keys always use `/` as separator and
//! must not contain `..` or a leading `/`. Validation is centralized in the
//! `keys` module so all backends stay consistent.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-memory")]
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::{LocalBucket, LocalStorage};
#[cfg(feature = "storage-memory")]
pub use memory::{MemoryBucket, MemoryStorage};
pub use traits::{Bucket, ByteSink, ByteStream, StorageError, StorageProvider, StorageResult};
pub use verstash_core::StorageBackend;
