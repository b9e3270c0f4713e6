//! File behaviors attached to records

mod common;
mod single;
mod transform;

pub use common::FileSource;
pub use single::FileBehavior;
pub use transform::{SaveReport, TransformFileBehavior, VariantOutcome};

use async_trait::async_trait;
use verstash_core::Record;

use crate::error::FileResult;

/// Record lifecycle events a file behavior reacts to.
///
/// The record layer calls these around its own persistence; the returned flag
/// reports whether a file was saved or deleted.
#[async_trait]
pub trait RecordFileHooks: Send + Sync {
    async fn after_insert(&mut self, record: &mut dyn Record) -> FileResult<bool>;

    async fn after_update(&mut self, record: &mut dyn Record) -> FileResult<bool>;

    async fn before_delete(&mut self, record: &dyn Record) -> FileResult<bool>;
}

#[async_trait]
impl RecordFileHooks for FileBehavior {
    async fn after_insert(&mut self, record: &mut dyn Record) -> FileResult<bool> {
        self.after_save(record).await
    }

    async fn after_update(&mut self, record: &mut dyn Record) -> FileResult<bool> {
        self.after_save(record).await
    }

    async fn before_delete(&mut self, record: &dyn Record) -> FileResult<bool> {
        FileBehavior::before_delete(self, record).await
    }
}

#[async_trait]
impl RecordFileHooks for TransformFileBehavior {
    async fn after_insert(&mut self, record: &mut dyn Record) -> FileResult<bool> {
        self.after_save(record).await
    }

    async fn after_update(&mut self, record: &mut dyn Record) -> FileResult<bool> {
        self.after_save(record).await
    }

    async fn before_delete(&mut self, record: &dyn Record) -> FileResult<bool> {
        TransformFileBehavior::before_delete(self, record).await
    }
}
