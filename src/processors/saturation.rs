// pixmark/src/processors/saturation.rs
use image::{Rgba, RgbaImage};
use imageproc::map::map_colors;

/// Scales color saturation by `level` percent: 0 gives gray pixels, 100 is a
/// no-op, 200 doubles the distance of every channel from the pixel's luma.
pub fn adjust_saturation(image: &RgbaImage, level: u8) -> RgbaImage {
    let factor = f32::from(level) / 100.0;
    log::debug!("Adjusting saturation to {}%", level);

    map_colors(image, |pixel: Rgba<u8>| {
        let [r, g, b, a] = pixel.0;
        let luma = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
        let mix = |c: u8| (luma + (f32::from(c) - luma) * factor).round().clamp(0.0, 255.0) as u8;
        Rgba([mix(r), mix(g), mix(b), a])
    })
}
