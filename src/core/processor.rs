// pixmark/src/core/processor.rs
use super::{ImageParams, PixmarkError, Result};
use crate::processors::{add_border, adjust_saturation, Compressor, Loader, Resizer, Watermarker};
use crate::utils::{get_file_extension, is_supported_format};
use image::{DynamicImage, ImageFormat};
use std::path::Path;

pub const DEFAULT_PREVIEW_SIZE: u32 = 800;

/// Transformation applied to one image file.
///
/// Implementations are invoked concurrently from worker threads, so they must
/// not rely on shared mutable state. Every failure is reported through the
/// returned `Result`; a panic is treated as a worker fault by the scheduler.
pub trait ImageOp: Send + Sync {
    fn process(&self, input_path: &Path, output_path: &Path, params: &ImageParams) -> Result<()>;
}

/// The default [`ImageOp`]: saturation, then border, then watermarks, saved
/// in the input's own format.
pub struct ImageProcessor {
    loader: Loader,
    compressor: Compressor,
    resizer: Resizer,
    watermarker: Watermarker,
}

impl ImageProcessor {
    pub fn new() -> Self {
        Self {
            loader: Loader::new(),
            compressor: Compressor::default(),
            resizer: Resizer::default(),
            watermarker: Watermarker::new(),
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.compressor = Compressor::new(quality);
        self
    }

    pub fn process_single(
        &self,
        input_path: &Path,
        output_path: &Path,
        params: &ImageParams,
    ) -> Result<()> {
        self.validate_input(input_path)?;

        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let format = self.loader.detect_format(input_path)?;
        let image = self.render(input_path, params)?;
        self.compressor.save_with_format(&image, output_path, format)?;

        log::debug!(
            "Processed {} -> {}",
            input_path.display(),
            output_path.display()
        );
        Ok(())
    }

    /// Processed image scaled down to fit `max_size`, encoded as PNG.
    pub fn generate_preview(
        &self,
        input_path: &Path,
        params: &ImageParams,
        max_size: u32,
    ) -> Result<Vec<u8>> {
        self.validate_input(input_path)?;

        let image = self.render(input_path, params)?;
        let preview = self.resizer.fit_within(&image, max_size);
        self.compressor.compress_to_bytes(&preview, ImageFormat::Png)
    }

    /// Loads `input_path` and runs the pixel pipeline without saving.
    pub fn render(&self, input_path: &Path, params: &ImageParams) -> Result<DynamicImage> {
        let decoded = self.loader.load(input_path)?;

        if params.saturation.is_none()
            && params.border_thickness.is_none()
            && params.watermarks.is_empty()
        {
            return Ok(decoded);
        }

        let mut image = decoded.to_rgba8();

        if let Some(level) = params.saturation.filter(|level| *level != 100) {
            image = adjust_saturation(&image, level);
        }

        if let Some(thickness) = params.border_thickness.filter(|t| *t > 0) {
            image = add_border(&image, thickness, params.border_color)?;
        }

        for watermark in params.watermarks.iter().filter(|wm| wm.is_enabled()) {
            self.watermarker.apply(&mut image, watermark)?;
        }

        Ok(DynamicImage::ImageRgba8(image))
    }

    fn validate_input(&self, input_path: &Path) -> Result<()> {
        if !input_path.exists() {
            return Err(PixmarkError::FileNotFound(input_path.to_path_buf()));
        }

        if !is_supported_format(input_path) {
            let ext = get_file_extension(input_path)
                .map(|ext| format!(".{}", ext))
                .unwrap_or_default();
            return Err(PixmarkError::UnsupportedFormat(ext));
        }

        Ok(())
    }
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageOp for ImageProcessor {
    fn process(&self, input_path: &Path, output_path: &Path, params: &ImageParams) -> Result<()> {
        self.process_single(input_path, output_path, params)
    }
}
