//! Upload intake contract
//!
//! The HTTP layer parses multipart bodies into temporary files; the file
//! behaviors only see the resulting [`UploadedFile`] handles through
//! [`UploadIntake`].

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Reason an upload was rejected by the intake layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadError {
    TooLarge,
    Partial,
    NoFile,
    WriteFailed,
    Rejected,
}

/// File received through the upload intake layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Client-side file name, used for the extension
    pub name: String,
    /// Location of the transient artifact holding the bytes
    pub temp_path: PathBuf,
    pub content_type: Option<String>,
    pub size: u64,
    pub error: Option<UploadError>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, temp_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            temp_path: temp_path.into(),
            content_type: None,
            size: 0,
            error: None,
        }
    }

    /// Build an upload handle for a file already on the local filesystem.
    pub async fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            name,
            temp_path: path.to_path_buf(),
            content_type: None,
            size: metadata.len(),
            error: None,
        })
    }

    /// Lower-cased extension of the client-side file name, empty if none
    pub fn extension(&self) -> String {
        Path::new(&self.name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Name of the upload field, qualified with the tabular index when present.
///
/// Tabular inputs are addressed as `[{index}]{field}`.
pub fn upload_field_name(field: &str, tabular_index: Option<usize>) -> String {
    match tabular_index {
        Some(index) => format!("[{}]{}", index, field),
        None => field.to_string(),
    }
}

/// Source of uploaded files for the current request
pub trait UploadIntake: Send + Sync {
    /// Fetch the file submitted for `field`, if any
    fn fetch(&self, field: &str, tabular_index: Option<usize>) -> Option<UploadedFile>;
}

/// Upload intake backed by an in-memory table of submitted files
#[derive(Debug, Default)]
pub struct MemoryUploadIntake {
    files: RwLock<HashMap<String, UploadedFile>>,
}

impl MemoryUploadIntake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a submitted file for the given field
    pub fn submit(&self, field: &str, tabular_index: Option<usize>, file: UploadedFile) {
        let key = upload_field_name(field, tabular_index);
        if let Ok(mut files) = self.files.write() {
            files.insert(key, file);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut files) = self.files.write() {
            files.clear();
        }
    }
}

impl UploadIntake for MemoryUploadIntake {
    fn fetch(&self, field: &str, tabular_index: Option<usize>) -> Option<UploadedFile> {
        let key = upload_field_name(field, tabular_index);
        self.files.read().ok()?.get(&key).cloned()
    }
}
