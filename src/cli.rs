// pixmark/src/cli.rs
use crate::core::{
    ImageParams, ProcessingConfig, Result, WatermarkPosition, WatermarkSpec, DEFAULT_PREVIEW_SIZE,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Batch border, saturation and watermark tool
#[derive(Parser, Debug)]
#[command(name = "pixmark")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process every image in a folder
    Batch {
        /// Folder to read images from (not recursive)
        #[arg(short, long)]
        input: PathBuf,

        /// Folder to write processed images to
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        effects: EffectArgs,

        /// Text prepended to every output file name
        #[arg(long, default_value = "")]
        prefix: String,

        /// Text appended to every output file stem
        #[arg(long, default_value = "")]
        suffix: String,

        /// Replace outputs that already exist instead of skipping them
        #[arg(long)]
        overwrite: bool,

        /// Process one image at a time
        #[arg(long)]
        sequential: bool,

        /// Worker count (0 = derive from CPU count)
        #[arg(short = 'j', long, default_value_t = 0)]
        workers: usize,
    },

    /// Process a single image
    Single {
        input: PathBuf,
        output: PathBuf,

        #[command(flatten)]
        effects: EffectArgs,
    },

    /// Write a scaled-down PNG preview of the processed image
    Preview {
        input: PathBuf,
        output: PathBuf,

        #[command(flatten)]
        effects: EffectArgs,

        /// Longest side of the preview in pixels
        #[arg(long, default_value_t = DEFAULT_PREVIEW_SIZE)]
        max_size: u32,
    },

    /// Count the images a batch over FOLDER would pick up
    Count { folder: PathBuf },
}

/// Effect flags shared by every processing command.
#[derive(Args, Debug, Clone)]
pub struct EffectArgs {
    /// Border thickness in pixels (0 = none)
    #[arg(long, default_value_t = 0)]
    pub border: u32,

    /// Border color as #RGB, #RRGGBB or #RRGGBBAA
    #[arg(long, default_value = "#FFFFFF")]
    pub border_color: String,

    /// Saturation percent: 0 = grayscale, 100 = unchanged, 200 = doubled
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u8).range(0..=200))]
    pub saturation: u8,

    /// Watermark image; repeat to stack several
    #[arg(long = "watermark")]
    pub watermarks: Vec<PathBuf>,

    /// Anchor for every watermark (top-left, top, ..., bottom-right)
    #[arg(long, default_value = "center")]
    pub wm_position: WatermarkPosition,

    #[arg(long, default_value_t = 0.5)]
    pub wm_opacity: f32,

    /// Watermark size as a percent of the image's shorter side
    #[arg(long, default_value_t = 25.0)]
    pub wm_scale: f32,

    #[arg(long, default_value_t = 20)]
    pub wm_margin: u32,
}

impl EffectArgs {
    pub fn watermark_specs(&self) -> Vec<WatermarkSpec> {
        self.watermarks
            .iter()
            .map(|path| WatermarkSpec {
                path: path.clone(),
                position: self.wm_position,
                opacity: self.wm_opacity,
                scale: self.wm_scale,
                margin: self.wm_margin,
            })
            .collect()
    }

    pub fn apply_to(&self, config: &mut ProcessingConfig) {
        config.border_thickness = self.border;
        config.border_color = self.border_color.clone();
        config.saturation = self.saturation;
        config.watermarks = self.watermark_specs();
    }

    /// Parameters for running the image op outside of a batch.
    pub fn image_params(&self) -> Result<ImageParams> {
        let mut config = ProcessingConfig::default();
        self.apply_to(&mut config);
        config.image_params()
    }
}
