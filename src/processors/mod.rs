// pixmark/src/processors/mod.rs
mod batch;
mod border;
mod compressor;
mod loader;
mod resizer;
mod saturation;
mod watermark;

pub use batch::{process_folder, BatchProcessor, CONFIG_ERROR_FILE};
pub use border::add_border;
pub use compressor::{Compressor, DEFAULT_JPEG_QUALITY};
pub use loader::{Loader, MAX_IMAGE_DIMENSION};
pub use resizer::{fit_dimensions, Resizer};
pub use saturation::adjust_saturation;
pub use watermark::{anchor_offset, scaled_dimensions, Watermarker};
