use anyhow::{bail, Context};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use pixmark::{
    count_images, BatchProcessor, Cli, Commands, EffectArgs, ImageOp, ImageProcessor,
    ProcessingConfig, ProcessingProgress, ProcessingState, ProgressObserver,
};
use std::path::PathBuf;
use std::sync::Arc;

const MAX_REPORTED_ERRORS: usize = 10;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .init();

    match cli.command {
        Commands::Batch {
            input,
            output,
            effects,
            prefix,
            suffix,
            overwrite,
            sequential,
            workers,
        } => {
            let mut config = ProcessingConfig {
                filename_prefix: prefix,
                filename_suffix: suffix,
                overwrite_existing: overwrite,
                parallel_processing: !sequential,
                max_workers: workers,
                ..ProcessingConfig::new(input, output)
            };
            effects.apply_to(&mut config);
            process_batch(config)?;
        }
        Commands::Single {
            input,
            output,
            effects,
        } => {
            process_single(input, output, &effects)?;
        }
        Commands::Preview {
            input,
            output,
            effects,
            max_size,
        } => {
            process_preview(input, output, &effects, max_size)?;
        }
        Commands::Count { folder } => {
            println!("{}", count_images(&folder));
        }
    }

    Ok(())
}

/// Mirrors batch progress onto a terminal progress bar.
struct ConsoleObserver {
    bar: ProgressBar,
}

impl ConsoleObserver {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar }
    }
}

impl ProgressObserver for ConsoleObserver {
    fn on_progress(&self, progress: &ProcessingProgress) {
        self.bar.set_length(progress.total_files as u64);
        self.bar.set_position(progress.processed_count as u64);
        self.bar.set_message(progress.current_file.clone());
    }

    fn on_complete(&self, progress: &ProcessingProgress) {
        self.bar.finish_with_message(format!(
            "{}: {} succeeded, {} failed, {} skipped",
            progress.state, progress.success_count, progress.error_count, progress.skipped_count
        ));
    }
}

fn process_batch(config: ProcessingConfig) -> anyhow::Result<()> {
    let output = config.output_folder.clone();

    let processor = BatchProcessor::new()
        .context("Failed to initialise batch processor")?
        .with_observer(Arc::new(ConsoleObserver::new()));

    processor.start(config).context("Failed to start batch")?;
    processor.wait_for_completion(None);

    let progress = processor.progress();
    print_summary(&progress);

    if progress.state == ProcessingState::Error {
        bail!("Batch processing failed");
    }

    println!(
        "Batch processing {}. Output written to: {}",
        progress.state,
        output.display()
    );

    Ok(())
}

fn print_summary(progress: &ProcessingProgress) {
    println!(
        "Processed {}/{} images: {} succeeded, {} failed, {} skipped",
        progress.processed_count,
        progress.total_files,
        progress.success_count,
        progress.error_count,
        progress.skipped_count
    );

    if progress.errors.is_empty() {
        return;
    }

    println!("\n=== Errors ===");
    for record in progress.errors.iter().take(MAX_REPORTED_ERRORS) {
        println!("{}: {}", record.file, record.error);
    }
    if progress.errors.len() > MAX_REPORTED_ERRORS {
        println!("... and {} more", progress.errors.len() - MAX_REPORTED_ERRORS);
    }
}

fn process_single(input: PathBuf, output: PathBuf, effects: &EffectArgs) -> anyhow::Result<()> {
    let params = effects.image_params().context("Invalid effect settings")?;

    ImageProcessor::new()
        .process(&input, &output, &params)
        .with_context(|| format!("Failed to process {}", input.display()))?;

    println!("Processed image saved to: {}", output.display());

    Ok(())
}

fn process_preview(
    input: PathBuf,
    output: PathBuf,
    effects: &EffectArgs,
    max_size: u32,
) -> anyhow::Result<()> {
    let params = effects.image_params().context("Invalid effect settings")?;

    let bytes = ImageProcessor::new()
        .generate_preview(&input, &params, max_size)
        .with_context(|| format!("Failed to render preview of {}", input.display()))?;
    std::fs::write(&output, bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Preview saved to: {}", output.display());

    Ok(())
}
