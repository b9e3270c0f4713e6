//! Image transforms

pub mod resize;

pub use resize::{ImageResizeTransformer, ResizeBox};
