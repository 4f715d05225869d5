// pixmark/src/processors/compressor.rs
use crate::core::Result;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use std::fs::File;
use std::io::{BufWriter, Cursor};
use std::path::Path;

pub const DEFAULT_JPEG_QUALITY: u8 = 92;

/// Encodes processed images back to disk in their original format.
pub struct Compressor {
    quality: u8,
}

impl Compressor {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn save_with_format(
        &self,
        image: &DynamicImage,
        path: &Path,
        format: ImageFormat,
    ) -> Result<()> {
        log::debug!(
            "Saving image to {} with format {:?}, quality: {}",
            path.display(),
            format,
            self.quality
        );

        match format {
            ImageFormat::Jpeg => self.save_jpeg(image, path),
            _ => self.save_generic(image, path, format),
        }
    }

    fn save_jpeg(&self, image: &DynamicImage, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);

        // JPEG has no alpha channel
        let encoder = JpegEncoder::new_with_quality(writer, self.quality);
        DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?;

        self.log_save_result(path)
    }

    fn save_generic(&self, image: &DynamicImage, path: &Path, format: ImageFormat) -> Result<()> {
        DynamicImage::ImageRgba8(image.to_rgba8()).save_with_format(path, format)?;
        self.log_save_result(path)
    }

    pub fn compress_to_bytes(&self, image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());

        match format {
            ImageFormat::Jpeg => {
                let encoder = JpegEncoder::new_with_quality(&mut buffer, self.quality);
                DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?;
            }
            _ => {
                image.write_to(&mut buffer, format)?;
            }
        }

        Ok(buffer.into_inner())
    }

    fn log_save_result(&self, path: &Path) -> Result<()> {
        let file_size = std::fs::metadata(path)?.len();
        log::debug!("Saved image: {} ({} bytes)", path.display(), file_size);
        Ok(())
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}
