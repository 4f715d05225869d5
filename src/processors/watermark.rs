// pixmark/src/processors/watermark.rs
use crate::core::{PixmarkError, Result, WatermarkPosition, WatermarkSpec};
use crate::processors::{Loader, Resizer};
use image::{imageops, Rgba, RgbaImage};
use imageproc::map::map_colors;

pub struct Watermarker {
    loader: Loader,
    resizer: Resizer,
}

impl Watermarker {
    pub fn new() -> Self {
        Self {
            loader: Loader::new(),
            resizer: Resizer::default(),
        }
    }

    /// Composites one watermark onto `image` in place.
    pub fn apply(&self, image: &mut RgbaImage, spec: &WatermarkSpec) -> Result<()> {
        if !spec.path.is_file() {
            return Err(PixmarkError::WatermarkNotFound(spec.path.clone()));
        }

        let mark = self.loader.load(&spec.path)?;
        let (width, height) = scaled_dimensions(
            image.dimensions(),
            (mark.width(), mark.height()),
            spec.scale,
        );
        let mut mark = self.resizer.resize_exact(&mark, width, height).to_rgba8();

        if spec.opacity < 1.0 {
            mark = apply_opacity(&mark, spec.opacity);
        }

        let (x, y) = anchor_offset(spec.position, image.dimensions(), mark.dimensions(), spec.margin);
        log::debug!(
            "Placing watermark {} ({}x{}) at {},{} [{}]",
            spec.path.display(),
            width,
            height,
            x,
            y,
            spec.position
        );

        imageops::overlay(image, &mark, x, y);
        Ok(())
    }
}

impl Default for Watermarker {
    fn default() -> Self {
        Self::new()
    }
}

/// Size of the watermark after scaling its longer side to `scale` percent of
/// the target's shorter side.
pub fn scaled_dimensions(target: (u32, u32), mark: (u32, u32), scale: f32) -> (u32, u32) {
    let shorter = target.0.min(target.1) as f32;
    let target_size = ((shorter * scale / 100.0) as u32).max(1);

    let (mark_w, mark_h) = (mark.0.max(1) as f32, mark.1.max(1) as f32);
    let ratio = mark_w / mark_h;

    if mark_w > mark_h {
        (target_size, ((target_size as f32 / ratio) as u32).max(1))
    } else {
        (((target_size as f32 * ratio) as u32).max(1), target_size)
    }
}

/// Top-left corner for the watermark. Centered axes ignore the margin and
/// offsets never go negative.
pub fn anchor_offset(
    position: WatermarkPosition,
    image: (u32, u32),
    mark: (u32, u32),
    margin: u32,
) -> (i64, i64) {
    use WatermarkPosition::*;

    let (image_w, image_h) = (i64::from(image.0), i64::from(image.1));
    let (mark_w, mark_h) = (i64::from(mark.0), i64::from(mark.1));
    let margin = i64::from(margin);

    let x = match position {
        TopLeft | Left | BottomLeft => margin,
        Top | Center | Bottom => (image_w - mark_w) / 2,
        TopRight | Right | BottomRight => image_w - mark_w - margin,
    };

    let y = match position {
        TopLeft | Top | TopRight => margin,
        Left | Center | Right => (image_h - mark_h) / 2,
        BottomLeft | Bottom | BottomRight => image_h - mark_h - margin,
    };

    (x.max(0), y.max(0))
}

fn apply_opacity(mark: &RgbaImage, opacity: f32) -> RgbaImage {
    let opacity = opacity.clamp(0.0, 1.0);
    map_colors(mark, |pixel: Rgba<u8>| {
        let [r, g, b, a] = pixel.0;
        Rgba([r, g, b, (f32::from(a) * opacity).round() as u8])
    })
}
