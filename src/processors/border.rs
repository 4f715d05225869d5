// pixmark/src/processors/border.rs
use super::MAX_IMAGE_DIMENSION;
use crate::core::{PixmarkError, Result};
use image::{imageops, Rgba, RgbaImage};

/// Grows the canvas by `thickness` on every side and fills the new area with `color`.
///
/// Fails when the framed canvas would exceed [`MAX_IMAGE_DIMENSION`] on either side.
pub fn add_border(image: &RgbaImage, thickness: u32, color: Rgba<u8>) -> Result<RgbaImage> {
    let (width, height) = framed_dimensions(image.dimensions(), thickness).ok_or_else(|| {
        PixmarkError::InvalidParameter(format!(
            "Border of {}px on a {}x{} image exceeds the {}px size limit",
            thickness,
            image.width(),
            image.height(),
            MAX_IMAGE_DIMENSION
        ))
    })?;
    log::debug!("Adding {}px border ({}x{})", thickness, width, height);

    let mut canvas = RgbaImage::from_pixel(width, height, color);
    imageops::replace(&mut canvas, image, i64::from(thickness), i64::from(thickness));
    Ok(canvas)
}

fn framed_dimensions((width, height): (u32, u32), thickness: u32) -> Option<(u32, u32)> {
    let grow = thickness.checked_mul(2)?;
    let width = width.checked_add(grow)?;
    let height = height.checked_add(grow)?;

    (width <= MAX_IMAGE_DIMENSION && height <= MAX_IMAGE_DIMENSION).then_some((width, height))
}
