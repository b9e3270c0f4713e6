use crate::traits::{FileTransformer, TransformError, TransformResult, TransformSettings};
use async_trait::async_trait;
use image::{DynamicImage, GenericImageView, ImageFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Bounding box a resized image must fit into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ResizeBox {
    pub width: u32,
    pub height: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ResizeBoxRepr {
    Pair([u32; 2]),
    Named { width: u32, height: u32 },
}

impl ResizeBox {
    /// Parse settings given as `[width, height]` or `{"width": .., "height": ..}`
    pub fn from_settings(settings: &TransformSettings) -> TransformResult<Self> {
        let repr = ResizeBoxRepr::deserialize(settings).map_err(|_| {
            TransformError::InvalidSettings(format!(
                "Resize settings must be a [width, height] pair, got {}",
                settings
            ))
        })?;

        let (width, height) = match repr {
            ResizeBoxRepr::Pair([width, height]) => (width, height),
            ResizeBoxRepr::Named { width, height } => (width, height),
        };

        if width == 0 || height == 0 {
            return Err(TransformError::InvalidSettings(format!(
                "Resize box must not be empty, got {}x{}",
                width, height
            )));
        }

        Ok(Self { width, height })
    }

    /// Dimensions of an image scaled to fit inside the box, keeping its aspect
    /// ratio. Images already inside the box are left at their size.
    pub fn fit(&self, orig_width: u32, orig_height: u32) -> (u32, u32) {
        if orig_width <= self.width && orig_height <= self.height {
            return (orig_width, orig_height);
        }

        let scale_width = self.width as f64 / orig_width as f64;
        let scale_height = self.height as f64 / orig_height as f64;
        let scale = scale_width.min(scale_height);

        let width = ((orig_width as f64 * scale).round() as u32).clamp(1, self.width);
        let height = ((orig_height as f64 * scale).round() as u32).clamp(1, self.height);
        (width, height)
    }
}

/// Resizes images to fit a box, writing them in the format implied by the
/// destination extension
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageResizeTransformer;

impl ImageResizeTransformer {
    /// Select appropriate filter type based on resize ratio
    fn select_filter(
        orig_width: u32,
        orig_height: u32,
        new_width: u32,
        new_height: u32,
    ) -> image::imageops::FilterType {
        let width_ratio = orig_width as f32 / new_width as f32;
        let height_ratio = orig_height as f32 / new_height as f32;
        let max_ratio = width_ratio.max(height_ratio);

        if max_ratio > 2.0 {
            image::imageops::FilterType::Triangle
        } else if max_ratio > 1.5 {
            image::imageops::FilterType::CatmullRom
        } else {
            image::imageops::FilterType::Lanczos3
        }
    }

    fn resize_file(source: &Path, destination: &Path, resize_box: ResizeBox) -> TransformResult<bool> {
        let img = image::ImageReader::open(source)?
            .with_guessed_format()?
            .decode()?;

        let (orig_width, orig_height) = img.dimensions();
        let (width, height) = resize_box.fit(orig_width, orig_height);

        let resized = if (width, height) == (orig_width, orig_height) {
            img
        } else {
            let filter = Self::select_filter(orig_width, orig_height, width, height);
            img.resize_exact(width, height, filter)
        };

        let format = ImageFormat::from_path(destination)?;
        let output = match format {
            // JPEG has no alpha channel
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(resized.to_rgb8()),
            _ => resized,
        };
        output.save_with_format(destination, format)?;

        tracing::debug!(
            source = %source.display(),
            destination = %destination.display(),
            orig_width,
            orig_height,
            width,
            height,
            "Image resized"
        );

        Ok(true)
    }
}

#[async_trait]
impl FileTransformer for ImageResizeTransformer {
    async fn transform(
        &self,
        source: &Path,
        destination: &Path,
        settings: &TransformSettings,
    ) -> TransformResult<bool> {
        let resize_box = ResizeBox::from_settings(settings)?;
        let source: PathBuf = source.to_path_buf();
        let destination: PathBuf = destination.to_path_buf();

        tokio::task::spawn_blocking(move || Self::resize_file(&source, &destination, resize_box))
            .await
            .map_err(|e| TransformError::Task(e.to_string()))?
    }

    fn validate_settings(&self, settings: &TransformSettings) -> TransformResult<()> {
        ResizeBox::from_settings(settings).map(|_| ())
    }
}
