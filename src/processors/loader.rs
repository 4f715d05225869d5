// pixmark/src/processors/loader.rs
use crate::core::{PixmarkError, Result};
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use std::path::Path;

/// Largest width or height accepted for a decoded or generated image.
pub const MAX_IMAGE_DIMENSION: u32 = 100_000;

#[derive(Debug, Clone)]
pub struct Loader {
    max_dimensions: Option<(u32, u32)>,
}

impl Loader {
    pub fn new() -> Self {
        Self {
            max_dimensions: Some((MAX_IMAGE_DIMENSION, MAX_IMAGE_DIMENSION)),
        }
    }

    pub fn with_max_dimensions(mut self, width: u32, height: u32) -> Self {
        self.max_dimensions = Some((width, height));
        self
    }

    pub fn load(&self, path: &Path) -> Result<DynamicImage> {
        log::debug!("Loading image from: {}", path.display());

        self.validate_path(path)?;

        let image = ImageReader::open(path)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| {
                PixmarkError::ProcessingError(format!("Failed to decode image: {}", e))
            })?;

        let (width, height) = image.dimensions();
        if let Some((max_w, max_h)) = self.max_dimensions {
            if width > max_w || height > max_h {
                return Err(PixmarkError::ProcessingError(format!(
                    "Image dimensions {}x{} exceed maximum {}x{}",
                    width, height, max_w, max_h
                )));
            }
        }

        log::debug!(
            "Loaded image: {}x{} pixels, color: {:?}",
            width,
            height,
            image.color()
        );

        Ok(image)
    }

    pub fn detect_format(&self, path: &Path) -> Result<ImageFormat> {
        ImageFormat::from_path(path).map_err(|_| {
            PixmarkError::UnsupportedFormat(format!(
                "cannot determine format of {}",
                path.display()
            ))
        })
    }

    fn validate_path(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(PixmarkError::FileNotFound(path.to_path_buf()));
        }

        let metadata = path.metadata()?;
        if metadata.len() == 0 {
            return Err(PixmarkError::InvalidParameter(format!(
                "File is empty: {}",
                path.display()
            )));
        }

        Ok(())
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}
