//! Error types module
//!
//! Errors raised by the record layer when the file behaviors ask it to
//! persist attribute changes.

/// Record layer errors
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Record persistence error: {0}")]
    Persistence(#[source] anyhow::Error),
}
