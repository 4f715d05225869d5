// pixmark/src/utils/mod.rs
use crate::core::{PixmarkError, Result};
use image::Rgba;
use std::path::{Path, PathBuf};

pub const SUPPORTED_EXTENSIONS: [&str; 8] =
    ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp"];

/// Destination for `input_path` inside `output_dir`:
/// `{prefix}{stem}{suffix}{.ext}`, keeping the original extension as written.
pub fn generate_output_path(
    input_path: &Path,
    output_dir: &Path,
    prefix: &str,
    suffix: &str,
) -> PathBuf {
    let stem = input_path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();

    let new_filename = match input_path.extension() {
        Some(ext) => format!("{}{}{}.{}", prefix, stem, suffix, ext.to_string_lossy()),
        None => format!("{}{}{}", prefix, stem, suffix),
    };

    output_dir.join(new_filename)
}

pub fn is_supported_format(path: &Path) -> bool {
    get_file_extension(path)
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

pub fn get_file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
}

/// Parses `#RGB`, `#RRGGBB` or `#RRGGBBAA`. The `#` may be left off.
pub fn parse_hex_color(value: &str) -> Result<Rgba<u8>> {
    let invalid = || PixmarkError::InvalidParameter(format!("Invalid color: {}", value));

    let trimmed = value.trim();
    let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());

    match hex.len() {
        3 => {
            let mut rgb = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let digit = channel(&c.to_string())?;
                rgb[i] = digit * 17;
            }
            Ok(Rgba([rgb[0], rgb[1], rgb[2], 255]))
        }
        6 | 8 => {
            let r = channel(&hex[0..2])?;
            let g = channel(&hex[2..4])?;
            let b = channel(&hex[4..6])?;
            let a = if hex.len() == 8 { channel(&hex[6..8])? } else { 255 };
            Ok(Rgba([r, g, b, a]))
        }
        _ => Err(invalid()),
    }
}
