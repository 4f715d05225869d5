mod cli;
mod core;
mod processors;
mod scheduler;
mod utils;

pub use crate::cli::{Cli, Commands, EffectArgs};
pub use crate::core::{
    auto_worker_count, validate_config, ErrorRecord, ImageOp, ImageParams, ImageProcessor,
    PixmarkError, ProcessingConfig, ProcessingProgress, ProcessingState, Result,
    WatermarkPosition, WatermarkSpec, DEFAULT_PREVIEW_SIZE, MAX_AUTO_WORKERS, MAX_WORKERS,
};
pub use crate::processors::{
    add_border, adjust_saturation, anchor_offset, fit_dimensions, process_folder,
    scaled_dimensions, BatchProcessor, Compressor, Loader, Resizer, Watermarker,
    CONFIG_ERROR_FILE, DEFAULT_JPEG_QUALITY, MAX_IMAGE_DIMENSION,
};
pub use crate::scheduler::{
    classify, count_images, enumerate_work_items, find_image_files, CancellationToken,
    Classified, DispatchOutcome, Dispatcher, ItemOutcome, ProgressHandle, ProgressObserver,
    WorkItem, BATCH_ERROR_FILE, DEFAULT_POLL_INTERVAL, SKIP_REASON,
};
pub use crate::utils::{
    generate_output_path, get_file_extension, is_supported_format, parse_hex_color,
    SUPPORTED_EXTENSIONS,
};

pub mod prelude {
    pub use crate::{
        BatchProcessor, ImageOp, ImageParams, ImageProcessor, ProcessingConfig,
        ProcessingProgress, ProcessingState, ProgressObserver, WatermarkPosition, WatermarkSpec,
    };
}

// Re-export commonly used types
pub use image::DynamicImage;
