// pixmark/src/core/config.rs
use super::Result;
use crate::utils::parse_hex_color;
use image::Rgba;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Upper bound for an explicit `max_workers` setting.
pub const MAX_WORKERS: usize = 32;

/// Ceiling applied when the worker count is derived from the host CPU count.
pub const MAX_AUTO_WORKERS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatermarkPosition {
    TopLeft,
    Top,
    TopRight,
    Left,
    #[default]
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl WatermarkPosition {
    pub const ALL: [WatermarkPosition; 9] = [
        WatermarkPosition::TopLeft,
        WatermarkPosition::Top,
        WatermarkPosition::TopRight,
        WatermarkPosition::Left,
        WatermarkPosition::Center,
        WatermarkPosition::Right,
        WatermarkPosition::BottomLeft,
        WatermarkPosition::Bottom,
        WatermarkPosition::BottomRight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WatermarkPosition::TopLeft => "top-left",
            WatermarkPosition::Top => "top",
            WatermarkPosition::TopRight => "top-right",
            WatermarkPosition::Left => "left",
            WatermarkPosition::Center => "center",
            WatermarkPosition::Right => "right",
            WatermarkPosition::BottomLeft => "bottom-left",
            WatermarkPosition::Bottom => "bottom",
            WatermarkPosition::BottomRight => "bottom-right",
        }
    }
}

impl fmt::Display for WatermarkPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatermarkPosition {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|position| position.as_str() == normalized)
            .ok_or_else(|| format!("Invalid watermark position: {}", s))
    }
}

/// One overlay composited onto every processed image.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkSpec {
    pub path: PathBuf,
    pub position: WatermarkPosition,
    /// 0.0 = invisible, 1.0 = opaque.
    pub opacity: f32,
    /// Percent of the target image's shorter dimension.
    pub scale: f32,
    pub margin: u32,
}

impl Default for WatermarkSpec {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            position: WatermarkPosition::Center,
            opacity: 0.5,
            scale: 25.0,
            margin: 20,
        }
    }
}

impl WatermarkSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.path.as_os_str().is_empty()
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.is_enabled() && !self.path.is_file() {
            errors.push(format!(
                "Watermark file not found: {}",
                self.path.display()
            ));
        }

        if !(0.0..=1.0).contains(&self.opacity) {
            errors.push("Watermark opacity must be between 0.0 and 1.0".to_string());
        }

        if !(1.0..=100.0).contains(&self.scale) {
            errors.push("Watermark scale must be between 1.0 and 100.0".to_string());
        }

        errors
    }
}

#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    pub input_folder: PathBuf,
    pub output_folder: PathBuf,
    /// Border thickness in pixels, 0 disables the border.
    pub border_thickness: u32,
    pub border_color: String,
    /// Saturation percent, 0 = grayscale, 100 = unchanged, 200 = doubled.
    pub saturation: u8,
    pub watermarks: Vec<WatermarkSpec>,
    pub filename_prefix: String,
    pub filename_suffix: String,
    pub overwrite_existing: bool,
    pub parallel_processing: bool,
    /// 0 derives the count from the host CPU count.
    pub max_workers: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            input_folder: PathBuf::new(),
            output_folder: PathBuf::new(),
            border_thickness: 0,
            border_color: "#FFFFFF".to_string(),
            saturation: 100,
            watermarks: Vec::new(),
            filename_prefix: String::new(),
            filename_suffix: String::new(),
            overwrite_existing: false,
            parallel_processing: true,
            max_workers: 0,
        }
    }
}

impl ProcessingConfig {
    pub fn new(input_folder: impl Into<PathBuf>, output_folder: impl Into<PathBuf>) -> Self {
        Self {
            input_folder: input_folder.into(),
            output_folder: output_folder.into(),
            ..Default::default()
        }
    }

    /// Collects every validation failure; an empty list means the config is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.input_folder.as_os_str().is_empty() {
            errors.push("Input folder is required".to_string());
        } else if !self.input_folder.is_dir() {
            errors.push(format!(
                "Input folder does not exist: {}",
                self.input_folder.display()
            ));
        }

        if self.output_folder.as_os_str().is_empty() {
            errors.push("Output folder is required".to_string());
        }

        if parse_hex_color(&self.border_color).is_err() {
            errors.push(format!("Invalid border color: {}", self.border_color));
        }

        if self.saturation > 200 {
            errors.push("Saturation must be between 0 and 200".to_string());
        }

        if self.max_workers > MAX_WORKERS {
            errors.push(format!("Max workers cannot exceed {}", MAX_WORKERS));
        }

        for (i, watermark) in self.watermarks.iter().enumerate() {
            for err in watermark.validate() {
                errors.push(format!("Watermark {}: {}", i + 1, err));
            }
        }

        errors
    }

    /// Resolved number of concurrent execution slots for a run.
    pub fn effective_workers(&self) -> usize {
        if !self.parallel_processing {
            return 1;
        }

        if self.max_workers > 0 {
            return self.max_workers.min(MAX_WORKERS);
        }

        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        auto_worker_count(cores)
    }

    /// Self-contained per-image parameters handed to every worker.
    pub fn image_params(&self) -> Result<ImageParams> {
        Ok(ImageParams {
            border_thickness: (self.border_thickness > 0).then_some(self.border_thickness),
            border_color: parse_hex_color(&self.border_color)?,
            saturation: (self.saturation != 100).then_some(self.saturation),
            watermarks: self
                .watermarks
                .iter()
                .filter(|wm| wm.is_enabled())
                .cloned()
                .collect(),
        })
    }
}

/// Leaves headroom for the host UI: one worker on tiny machines, then one or
/// two cores reserved, never more than [`MAX_AUTO_WORKERS`].
pub fn auto_worker_count(cores: usize) -> usize {
    match cores {
        0..=2 => 1,
        3..=4 => cores - 1,
        _ => (cores - 2).min(MAX_AUTO_WORKERS),
    }
}

/// Parameters of the per-image transformation. Plain values only, so a copy
/// can be moved into any worker.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageParams {
    pub border_thickness: Option<u32>,
    pub border_color: Rgba<u8>,
    pub saturation: Option<u8>,
    pub watermarks: Vec<WatermarkSpec>,
}

impl Default for ImageParams {
    fn default() -> Self {
        Self {
            border_thickness: None,
            border_color: Rgba([255, 255, 255, 255]),
            saturation: None,
            watermarks: Vec::new(),
        }
    }
}
