// pixmark/src/processors/batch.rs
use crate::core::{
    validate_config, ErrorRecord, ImageOp, ImageParams, ImageProcessor, PixmarkError,
    ProcessingConfig, ProcessingProgress, ProcessingState, Result,
};
use crate::scheduler::{
    classify, enumerate_work_items, panic_message, CancellationToken, Classified,
    DispatchOutcome, Dispatcher, ProgressHandle, ProgressObserver, DEFAULT_POLL_INTERVAL,
    SKIP_REASON,
};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// File label of the record produced when `process_folder` rejects a config.
pub const CONFIG_ERROR_FILE: &str = "CONFIG";

const WAIT_STEP: Duration = Duration::from_millis(10);

/// Runs folder batches in the background and reports their progress.
///
/// One processor runs at most one batch at a time. `start` returns as soon as
/// the run is underway; poll `progress()` or install a [`ProgressObserver`]
/// to follow it.
pub struct BatchProcessor {
    op: Arc<dyn ImageOp>,
    progress: ProgressHandle,
    cancel: Mutex<CancellationToken>,
    worker: Mutex<Option<JoinHandle<()>>>,
    poll_interval: Duration,
}

impl BatchProcessor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            op: Arc::new(ImageProcessor::new()),
            progress: ProgressHandle::spawn()?,
            cancel: Mutex::new(CancellationToken::new()),
            worker: Mutex::new(None),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_image_op(mut self, op: Arc<dyn ImageOp>) -> Self {
        self.op = op;
        self
    }

    pub fn with_observer(self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.progress.set_observer(Some(observer));
        self
    }

    /// Upper bound on how long a cancellation request can go unnoticed while
    /// every worker is busy.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn set_observer(&self, observer: Option<Arc<dyn ProgressObserver>>) {
        self.progress.set_observer(observer);
    }

    /// Validates `config` and starts a background run.
    ///
    /// Fails without touching the current progress when the config is invalid
    /// or a run is already in progress.
    pub fn start(&self, config: ProcessingConfig) -> Result<()> {
        validate_config(&config)?;
        let params = Arc::new(config.image_params()?);

        let mut cancel = lock(&self.cancel);
        if !self.progress.begin() {
            return Err(PixmarkError::AlreadyRunning);
        }

        // a late cancel() from the previous run must not leak into this one
        let token = CancellationToken::new();
        *cancel = token.clone();

        log::info!(
            "Starting batch: {} -> {}",
            config.input_folder.display(),
            config.output_folder.display()
        );

        let run = BatchRun {
            config,
            params,
            op: Arc::clone(&self.op),
            progress: self.progress.clone(),
            cancel: token,
            poll_interval: self.poll_interval,
        };

        let spawned = thread::Builder::new()
            .name("pixmark-batch".to_string())
            .spawn(move || run.execute());

        match spawned {
            Ok(handle) => {
                *lock(&self.worker) = Some(handle);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to spawn batch thread: {}", e);
                self.progress.fail(format!("Fatal error: {}", e));
                Err(e.into())
            }
        }
    }

    /// Requests cancellation of the current run. Does nothing when no run is
    /// in progress.
    pub fn cancel(&self) {
        log::debug!("Cancellation requested");
        lock(&self.cancel).request();
    }

    pub fn progress(&self) -> ProcessingProgress {
        self.progress.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.progress.snapshot().is_running()
    }

    /// Blocks until the background run has finished, completion callback
    /// included. Returns `false` if `timeout` elapsed first.
    pub fn wait_for_completion(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            {
                let mut worker = lock(&self.worker);
                match worker.as_ref() {
                    None => return true,
                    Some(handle) if handle.is_finished() => {
                        if let Some(handle) = worker.take() {
                            if handle.join().is_err() {
                                log::warn!("Batch thread panicked");
                            }
                        }
                        return true;
                    }
                    Some(_) => {}
                }
            }

            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return false;
                }
                thread::sleep(WAIT_STEP.min(deadline - now));
            } else {
                thread::sleep(WAIT_STEP);
            }
        }
    }
}

impl Drop for BatchProcessor {
    fn drop(&mut self) {
        lock(&self.cancel).request();
    }
}

/// Everything one background run needs, moved onto the batch thread.
struct BatchRun {
    config: ProcessingConfig,
    params: Arc<ImageParams>,
    op: Arc<dyn ImageOp>,
    progress: ProgressHandle,
    cancel: CancellationToken,
    poll_interval: Duration,
}

impl BatchRun {
    fn execute(self) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.dispatch()));

        let summary = match result {
            Ok(Ok(DispatchOutcome::Completed)) => self.progress.finish(ProcessingState::Completed),
            Ok(Ok(DispatchOutcome::Cancelled)) => self.progress.finish(ProcessingState::Cancelled),
            Ok(Err(e)) => {
                log::error!("Batch aborted: {}", e);
                self.progress.fail(format!("Fatal error: {}", e))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::error!("Batch aborted by panic: {}", message);
                self.progress.fail(format!("Fatal error: {}", message))
            }
        };

        log::info!(
            "Batch {}: {} processed, {} succeeded, {} failed, {} skipped",
            summary.state,
            summary.processed_count,
            summary.success_count,
            summary.error_count,
            summary.skipped_count
        );
    }

    fn dispatch(&self) -> Result<DispatchOutcome> {
        std::fs::create_dir_all(&self.config.output_folder)?;

        let items = enumerate_work_items(&self.config);
        log::info!(
            "Found {} images in {}",
            items.len(),
            self.config.input_folder.display()
        );
        self.progress.set_total(items.len());

        let Classified { skipped, eligible } = classify(items, self.config.overwrite_existing);
        for item in skipped {
            log::debug!("Skipping {}: output exists", item.display_name);
            self.progress.skip(item.display_name, SKIP_REASON);
        }

        let workers = self.config.effective_workers();
        Dispatcher::new(Arc::clone(&self.op), self.progress.clone(), self.cancel.clone())
            .with_poll_interval(self.poll_interval)
            .run(eligible, Arc::clone(&self.params), workers)
    }
}

/// Runs one batch to completion on the calling thread's behalf.
///
/// An invalid config never starts a run; it comes back as an `Error` progress
/// holding a single [`CONFIG_ERROR_FILE`] record.
pub fn process_folder(
    config: ProcessingConfig,
    observer: Option<Arc<dyn ProgressObserver>>,
) -> ProcessingProgress {
    let errors = config.validate();
    if !errors.is_empty() {
        return rejected(errors.join("; "));
    }

    let processor = match BatchProcessor::new() {
        Ok(processor) => processor,
        Err(e) => return rejected(e.to_string()),
    };
    processor.set_observer(observer);

    if let Err(e) = processor.start(config) {
        return rejected(e.to_string());
    }

    processor.wait_for_completion(None);
    processor.progress()
}

fn rejected(message: String) -> ProcessingProgress {
    ProcessingProgress {
        state: ProcessingState::Error,
        errors: vec![ErrorRecord::new(CONFIG_ERROR_FILE, message)],
        ..Default::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::BATCH_ERROR_FILE;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Touch {
        calls: AtomicUsize,
        delay: Duration,
    }

    impl Touch {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
            })
        }
    }

    impl ImageOp for Touch {
        fn process(&self, _input: &Path, output: &Path, _params: &ImageParams) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            std::fs::write(output, b"done")?;
            Ok(())
        }
    }

    fn folder_with(count: usize) -> TempDir {
        let temp = TempDir::new().unwrap();
        for i in 0..count {
            temp.child(format!("img{:02}.png", i)).touch().unwrap();
        }
        temp
    }

    #[test]
    fn test_start_runs_to_completion() {
        let input = folder_with(4);
        let output = TempDir::new().unwrap();
        let op = Touch::new(Duration::ZERO);

        let processor = BatchProcessor::new().unwrap().with_image_op(op.clone());
        assert_eq!(processor.progress().state, ProcessingState::Idle);

        processor
            .start(ProcessingConfig::new(input.path(), output.path()))
            .unwrap();
        assert!(processor.wait_for_completion(Some(Duration::from_secs(10))));

        let progress = processor.progress();
        assert_eq!(progress.state, ProcessingState::Completed);
        assert_eq!(progress.total_files, 4);
        assert_eq!(progress.success_count, 4);
        assert_eq!(op.calls.load(Ordering::SeqCst), 4);
        assert!(!processor.is_running());
    }

    #[test]
    fn test_invalid_config_is_rejected_synchronously() {
        let processor = BatchProcessor::new().unwrap();
        let err = processor.start(ProcessingConfig::default()).unwrap_err();

        assert_eq!(
            err.to_string(),
            "Input folder is required; Output folder is required"
        );
        assert_eq!(processor.progress().state, ProcessingState::Idle);
    }

    #[test]
    fn test_second_start_is_refused_while_running() {
        let input = folder_with(3);
        let output = TempDir::new().unwrap();
        let processor = BatchProcessor::new()
            .unwrap()
            .with_image_op(Touch::new(Duration::from_millis(100)));

        let config = ProcessingConfig {
            parallel_processing: false,
            ..ProcessingConfig::new(input.path(), output.path())
        };
        processor.start(config.clone()).unwrap();

        let err = processor.start(config).unwrap_err();
        assert!(matches!(err, PixmarkError::AlreadyRunning));

        assert!(processor.wait_for_completion(Some(Duration::from_secs(10))));
        assert_eq!(processor.progress().success_count, 3);
    }

    #[test]
    fn test_wait_times_out_on_long_run() {
        let input = folder_with(2);
        let output = TempDir::new().unwrap();
        let processor = BatchProcessor::new()
            .unwrap()
            .with_image_op(Touch::new(Duration::from_millis(300)));

        let config = ProcessingConfig {
            parallel_processing: false,
            ..ProcessingConfig::new(input.path(), output.path())
        };
        processor.start(config).unwrap();

        assert!(!processor.wait_for_completion(Some(Duration::from_millis(20))));
        processor.cancel();
        assert!(processor.wait_for_completion(Some(Duration::from_secs(10))));
        assert_eq!(processor.progress().state, ProcessingState::Cancelled);
    }

    #[test]
    fn test_cancel_before_start_does_not_leak_into_run() {
        let input = folder_with(2);
        let output = TempDir::new().unwrap();
        let processor = BatchProcessor::new()
            .unwrap()
            .with_image_op(Touch::new(Duration::ZERO));

        processor.cancel();
        processor
            .start(ProcessingConfig::new(input.path(), output.path()))
            .unwrap();
        assert!(processor.wait_for_completion(None));

        assert_eq!(processor.progress().state, ProcessingState::Completed);
    }

    #[test]
    fn test_unwritable_output_root_is_batch_fatal() {
        let input = folder_with(2);
        let blocker = TempDir::new().unwrap();
        blocker.child("taken").touch().unwrap();

        let processor = BatchProcessor::new()
            .unwrap()
            .with_image_op(Touch::new(Duration::ZERO));
        processor
            .start(ProcessingConfig::new(
                input.path(),
                blocker.child("taken").path(),
            ))
            .unwrap();
        assert!(processor.wait_for_completion(None));

        let progress = processor.progress();
        assert_eq!(progress.state, ProcessingState::Error);
        assert_eq!(progress.processed_count, 0);
        assert_eq!(progress.errors.len(), 1);
        assert_eq!(progress.errors[0].file, BATCH_ERROR_FILE);
        assert!(progress.errors[0].error.starts_with("Fatal error: "));
    }

    #[test]
    fn test_process_folder_reports_config_errors() {
        let progress = process_folder(ProcessingConfig::new("", "/tmp/out"), None);

        assert_eq!(progress.state, ProcessingState::Error);
        assert_eq!(
            progress.errors,
            vec![ErrorRecord::new(CONFIG_ERROR_FILE, "Input folder is required")]
        );
    }

    #[test]
    fn test_process_folder_blocks_until_done() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();

        // nothing to do: still a full run with a completion
        let completions = Arc::new(AtomicUsize::new(0));
        struct Counter(Arc<AtomicUsize>);
        impl ProgressObserver for Counter {
            fn on_progress(&self, _progress: &ProcessingProgress) {}
            fn on_complete(&self, _progress: &ProcessingProgress) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let progress = process_folder(
            ProcessingConfig::new(input.path(), output.path()),
            Some(Arc::new(Counter(completions.clone()))),
        );

        assert_eq!(progress.state, ProcessingState::Completed);
        assert_eq!(progress.total_files, 0);
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }
}
