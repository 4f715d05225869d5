// pixmark/src/scheduler/enumerator.rs
use crate::core::ProcessingConfig;
use crate::utils::{generate_output_path, is_supported_format};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Message recorded for items whose destination already exists.
pub const SKIP_REASON: &str = "Output file already exists (overwrite disabled)";

/// One input file and where its processed copy goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub input: PathBuf,
    pub output: PathBuf,
    pub display_name: String,
}

/// Regular files directly inside `folder` with a supported extension,
/// sorted by file name.
///
/// Entries that cannot be read (including an unreadable `folder`) are
/// dropped silently, so such a folder simply yields no files.
pub fn find_image_files(folder: &Path) -> Vec<PathBuf> {
    WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| is_supported_format(entry.path()))
        .map(|entry| entry.into_path())
        .collect()
}

pub fn count_images(folder: &Path) -> usize {
    find_image_files(folder).len()
}

/// Work items for every eligible input, destinations named by the config's
/// prefix/suffix policy.
pub fn enumerate_work_items(config: &ProcessingConfig) -> Vec<WorkItem> {
    find_image_files(&config.input_folder)
        .into_iter()
        .map(|input| {
            let output = generate_output_path(
                &input,
                &config.output_folder,
                &config.filename_prefix,
                &config.filename_suffix,
            );
            let display_name = input
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            WorkItem {
                input,
                output,
                display_name,
            }
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct Classified {
    pub skipped: Vec<WorkItem>,
    pub eligible: Vec<WorkItem>,
}

/// Splits items into those whose destination already exists (only when
/// overwriting is disabled) and those to dispatch. Both keep enumeration order.
pub fn classify(items: Vec<WorkItem>, overwrite_existing: bool) -> Classified {
    let (skipped, eligible) = items
        .into_iter()
        .partition(|item| !overwrite_existing && item.output.exists());

    Classified { skipped, eligible }
}
