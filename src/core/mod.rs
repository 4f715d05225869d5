// pixmark/src/core/mod.rs
mod config;
mod processor;
mod progress;

use std::path::PathBuf;
use thiserror::Error;

pub use config::{
    auto_worker_count, ImageParams, ProcessingConfig, WatermarkPosition, WatermarkSpec,
    MAX_AUTO_WORKERS, MAX_WORKERS,
};
pub use processor::{ImageOp, ImageProcessor, DEFAULT_PREVIEW_SIZE};
pub use progress::{ErrorRecord, ProcessingProgress, ProcessingState};

#[derive(Error, Debug)]
pub enum PixmarkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("{}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    #[error("Processing is already running")]
    AlreadyRunning,

    #[error("Input file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Watermark file not found: {}", .0.display())]
    WatermarkNotFound(PathBuf),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Processing error: {0}")]
    ProcessingError(String),

    #[error("Worker failed: {0}")]
    WorkerFailed(String),
}

pub type Result<T> = std::result::Result<T, PixmarkError>;

/// Validates a configuration, folding every collected message into one error.
pub fn validate_config(config: &ProcessingConfig) -> Result<()> {
    let errors = config.validate();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(PixmarkError::InvalidConfig(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_joins_messages() {
        let err = PixmarkError::InvalidConfig(vec![
            "Input folder is required".to_string(),
            "Output folder is required".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Input folder is required; Output folder is required"
        );
    }

    #[test]
    fn watermark_not_found_message() {
        let err = PixmarkError::WatermarkNotFound(PathBuf::from("/nope/logo.png"));
        assert_eq!(err.to_string(), "Watermark file not found: /nope/logo.png");
    }
}
