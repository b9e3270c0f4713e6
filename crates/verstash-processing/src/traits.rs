//! Core traits for file transformations
//!
//! A transformer reads a local source file, writes its derived variant to a
//! local destination path and reports whether that worked. Settings are the
//! opaque JSON value configured for the variant.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Settings configured for one transformation entry
pub type TransformSettings = serde_json::Value;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Invalid transform settings: {0}")]
    InvalidSettings(String),

    #[cfg(feature = "image")]
    #[error("Image error: {0}")]
    Image(#[from] ::image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transform task failed: {0}")]
    Task(String),
}

pub type TransformResult<T> = Result<T, TransformError>;

/// Transform function plugged into a multi-variant file behavior
#[async_trait]
pub trait FileTransformer: Send + Sync {
    /// Write the transformed `source` to `destination`.
    ///
    /// `Ok(false)` reports a transform that ran but did not produce output.
    async fn transform(
        &self,
        source: &Path,
        destination: &Path,
        settings: &TransformSettings,
    ) -> TransformResult<bool>;

    /// Check settings before any file is touched
    fn validate_settings(&self, _settings: &TransformSettings) -> TransformResult<()> {
        Ok(())
    }
}
