// pixmark/src/processors/resizer.rs
use image::{imageops::FilterType, DynamicImage};

pub struct Resizer {
    filter: FilterType,
}

impl Resizer {
    pub fn new(filter: FilterType) -> Self {
        Self { filter }
    }

    pub fn resize_exact(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        if width == image.width() && height == image.height() {
            return image.clone();
        }

        log::debug!(
            "Resizing image from {}x{} to {}x{}",
            image.width(),
            image.height(),
            width,
            height
        );

        image.resize_exact(width.max(1), height.max(1), self.filter)
    }

    /// Downscales so neither side exceeds `max_size`. Never upscales.
    pub fn fit_within(&self, image: &DynamicImage, max_size: u32) -> DynamicImage {
        let (width, height) = fit_dimensions(image.width(), image.height(), max_size);
        self.resize_exact(image, width, height)
    }
}

impl Default for Resizer {
    fn default() -> Self {
        Self::new(FilterType::Lanczos3)
    }
}

pub fn fit_dimensions(orig_w: u32, orig_h: u32, max_size: u32) -> (u32, u32) {
    if max_size == 0 || (orig_w <= max_size && orig_h <= max_size) {
        return (orig_w, orig_h);
    }

    let ratio_w = max_size as f32 / orig_w as f32;
    let ratio_h = max_size as f32 / orig_h as f32;
    let ratio = ratio_w.min(ratio_h);

    let new_w = (orig_w as f32 * ratio) as u32;
    let new_h = (orig_h as f32 * ratio) as u32;

    (new_w.max(1), new_h.max(1))
}
