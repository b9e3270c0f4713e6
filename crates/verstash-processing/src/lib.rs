//! Verstash Processing Library
//!
//! Transform functions that turn one stored source file into a derived
//! variant: a verbatim copy, an arbitrary closure, or an image resized to fit
//! a box.

pub mod copy;
pub mod traits;

#[cfg(feature = "image")]
pub mod image;

// Re-export commonly used types
pub use copy::{CopyTransformer, FnTransformer};
pub use traits::{FileTransformer, TransformError, TransformResult, TransformSettings};

#[cfg(feature = "image")]
pub use self::image::{ImageResizeTransformer, ResizeBox};
