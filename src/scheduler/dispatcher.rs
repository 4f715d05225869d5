// pixmark/src/scheduler/dispatcher.rs
//
// Runs eligible work items through an `ImageOp`.
//
// One worker: items run in enumeration order on the calling thread, with a
// cancellation check before each one.
//
// N workers: a rayon pool of N threads fed from a sliding window of at most
// 2N in-flight items. Completions come back over a channel and are merged in
// arrival order; each merge frees one slot for the next queued item. The wait
// for a completion is bounded by the poll interval so a cancellation request
// is seen within one interval even when every worker is busy.

use super::{panic_message, CancellationToken, ItemOutcome, ProgressHandle, WorkItem};
use crate::core::{ImageOp, ImageParams, PixmarkError, Result};
use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Completed,
    Cancelled,
}

struct Completion {
    item: WorkItem,
    outcome: ItemOutcome,
}

pub struct Dispatcher {
    op: Arc<dyn ImageOp>,
    progress: ProgressHandle,
    cancel: CancellationToken,
    poll_interval: Duration,
    peak_in_flight: AtomicUsize,
}

impl Dispatcher {
    pub fn new(op: Arc<dyn ImageOp>, progress: ProgressHandle, cancel: CancellationToken) -> Self {
        Self {
            op,
            progress,
            cancel,
            poll_interval: DEFAULT_POLL_INTERVAL,
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Most items that were submitted but not yet merged at any one time during
    /// the latest windowed run. Never above `2 * workers`.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Processes `items` with `workers` execution slots. Per-item failures are
    /// recorded and never abort the run; an `Err` means the dispatcher itself
    /// could not operate.
    pub fn run(
        &self,
        items: Vec<WorkItem>,
        params: Arc<ImageParams>,
        workers: usize,
    ) -> Result<DispatchOutcome> {
        if workers <= 1 {
            Ok(self.run_sequential(items, &params))
        } else {
            self.run_windowed(items, params, workers)
        }
    }

    fn run_sequential(&self, items: Vec<WorkItem>, params: &ImageParams) -> DispatchOutcome {
        for item in items {
            if self.cancel.is_requested() {
                log::info!("Cancellation requested, stopping before {}", item.display_name);
                return DispatchOutcome::Cancelled;
            }

            self.progress.set_current(item.display_name.as_str());
            let outcome = execute(self.op.as_ref(), &item, params);
            self.progress.record(item.display_name, outcome);
        }

        DispatchOutcome::Completed
    }

    fn run_windowed(
        &self,
        items: Vec<WorkItem>,
        params: Arc<ImageParams>,
        workers: usize,
    ) -> Result<DispatchOutcome> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("pixmark-worker-{}", i))
            .panic_handler(|payload| {
                log::error!("Worker task panicked: {}", panic_message(payload.as_ref()));
            })
            .build()
            .map_err(|e| {
                PixmarkError::ProcessingError(format!("Failed to create thread pool: {}", e))
            })?;

        let (done_tx, done_rx) = unbounded::<Completion>();
        let mut queue: VecDeque<WorkItem> = items.into();
        let window = (workers * 2).min(queue.len());

        self.progress
            .set_current(format!("Processing with {} workers", workers));
        log::debug!(
            "Dispatching {} items across {} workers (window {})",
            queue.len(),
            workers,
            window
        );

        self.peak_in_flight.store(0, Ordering::SeqCst);
        let mut in_flight = 0usize;
        while in_flight < window {
            match queue.pop_front() {
                Some(item) => {
                    self.submit(&pool, item, &params, &done_tx);
                    in_flight += 1;
                    self.peak_in_flight.fetch_max(in_flight, Ordering::SeqCst);
                }
                None => break,
            }
        }

        while in_flight > 0 {
            if self.cancel.is_requested() {
                log::info!(
                    "Cancellation requested, abandoning {} in-flight and {} queued items",
                    in_flight,
                    queue.len()
                );
                return Ok(DispatchOutcome::Cancelled);
            }

            match done_rx.recv_timeout(self.poll_interval) {
                Ok(Completion { item, outcome }) => {
                    in_flight -= 1;
                    self.progress.record(item.display_name, outcome);

                    if !self.cancel.is_requested() {
                        if let Some(next) = queue.pop_front() {
                            self.submit(&pool, next, &params, &done_tx);
                            in_flight += 1;
                            self.peak_in_flight.fetch_max(in_flight, Ordering::SeqCst);
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(PixmarkError::ProcessingError(
                        "Worker completion channel closed".to_string(),
                    ));
                }
            }
        }

        if self.cancel.is_requested() && !queue.is_empty() {
            return Ok(DispatchOutcome::Cancelled);
        }

        Ok(DispatchOutcome::Completed)
    }

    fn submit(
        &self,
        pool: &ThreadPool,
        item: WorkItem,
        params: &Arc<ImageParams>,
        done: &Sender<Completion>,
    ) {
        let op = Arc::clone(&self.op);
        let params = Arc::clone(params);
        let cancel = self.cancel.clone();
        let done = done.clone();

        pool.spawn(move || {
            // abandoned by a cancelled run before it started
            if cancel.is_requested() {
                return;
            }

            let outcome = execute(op.as_ref(), &item, &params);
            // the receiver is gone once a cancelled run has returned
            let _ = done.send(Completion { item, outcome });
        });
    }
}

/// Runs the op for one item, folding both reported errors and panics into a
/// per-item outcome.
fn execute(op: &dyn ImageOp, item: &WorkItem, params: &ImageParams) -> ItemOutcome {
    log::debug!("Processing {}", item.display_name);

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        op.process(&item.input, &item.output, params)
    }));

    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            log::warn!("Failed to process {}: {}", item.display_name, e);
            Err(e.to_string())
        }
        Err(payload) => {
            let err = PixmarkError::WorkerFailed(panic_message(payload.as_ref()));
            log::error!("{} while processing {}", err, item.display_name);
            Err(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ProcessingState, Result};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    /// Sleeps per item and tracks how many calls overlap.
    struct ConcurrencyProbe {
        delay: Duration,
        active: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl ConcurrencyProbe {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ImageOp for ConcurrencyProbe {
        fn process(&self, input: &Path, _output: &Path, _params: &ImageParams) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.active.fetch_sub(1, Ordering::SeqCst);

            let name = input.file_name().unwrap().to_string_lossy();
            if name.starts_with("bad") {
                return Err(PixmarkError::ProcessingError("corrupt data".to_string()));
            }
            if name.starts_with("panic") {
                panic!("codec exploded");
            }
            Ok(())
        }
    }

    fn items(names: &[&str]) -> Vec<WorkItem> {
        names
            .iter()
            .map(|name| WorkItem {
                input: PathBuf::from("/in").join(name),
                output: PathBuf::from("/out").join(name),
                display_name: name.to_string(),
            })
            .collect()
    }

    fn numbered(count: usize) -> Vec<WorkItem> {
        let names: Vec<String> = (0..count).map(|i| format!("img{:03}.png", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        items(&refs)
    }

    fn started_handle(total: usize) -> ProgressHandle {
        let handle = ProgressHandle::spawn().unwrap();
        assert!(handle.begin());
        handle.set_total(total);
        handle
    }

    #[test]
    fn test_sequential_runs_one_at_a_time() {
        let probe = Arc::new(ConcurrencyProbe::new(Duration::from_millis(2)));
        let progress = started_handle(6);
        let dispatcher = Dispatcher::new(probe.clone(), progress.clone(), CancellationToken::new());

        let outcome = dispatcher
            .run(numbered(6), Arc::new(ImageParams::default()), 1)
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Completed);
        assert_eq!(probe.peak.load(Ordering::SeqCst), 1);
        assert_eq!(progress.snapshot().success_count, 6);
    }

    #[test]
    fn test_windowed_run_is_bounded_by_workers() {
        let probe = Arc::new(ConcurrencyProbe::new(Duration::from_millis(5)));
        let progress = started_handle(40);
        let dispatcher = Dispatcher::new(probe.clone(), progress.clone(), CancellationToken::new())
            .with_poll_interval(Duration::from_millis(10));

        let outcome = dispatcher
            .run(numbered(40), Arc::new(ImageParams::default()), 3)
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Completed);
        assert!(probe.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 40);

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.processed_count, 40);
        assert_eq!(snapshot.success_count, 40);
        assert_eq!(snapshot.current_file, "Processing with 3 workers");
    }

    /// Holds every call until `open` is set.
    struct Gate {
        open: std::sync::atomic::AtomicBool,
        calls: AtomicUsize,
    }

    impl ImageOp for Gate {
        fn process(&self, _input: &Path, _output: &Path, _params: &ImageParams) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            while !self.open.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(1));
            }
            Ok(())
        }
    }

    #[test]
    fn test_stalled_workers_hold_window_at_twice_workers() {
        let gate = Arc::new(Gate {
            open: std::sync::atomic::AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        });
        let progress = started_handle(10);
        let dispatcher = Arc::new(
            Dispatcher::new(gate.clone(), progress.clone(), CancellationToken::new())
                .with_poll_interval(Duration::from_millis(5)),
        );

        let runner = {
            let dispatcher = Arc::clone(&dispatcher);
            std::thread::spawn(move || {
                dispatcher.run(numbered(10), Arc::new(ImageParams::default()), 2)
            })
        };

        let deadline = Instant::now() + Duration::from_secs(10);
        while gate.calls.load(Ordering::SeqCst) < 2 {
            assert!(Instant::now() < deadline, "workers never started");
            std::thread::sleep(Duration::from_millis(1));
        }
        std::thread::sleep(Duration::from_millis(50));

        // both workers blocked: two running, two queued in the pool, six held back
        assert_eq!(dispatcher.peak_in_flight(), 4);
        assert_eq!(gate.calls.load(Ordering::SeqCst), 2);
        assert_eq!(progress.snapshot().processed_count, 0);

        gate.open.store(true, Ordering::SeqCst);
        let outcome = runner.join().unwrap().unwrap();

        assert_eq!(outcome, DispatchOutcome::Completed);
        assert_eq!(dispatcher.peak_in_flight(), 4);
        assert_eq!(gate.calls.load(Ordering::SeqCst), 10);
        assert_eq!(progress.snapshot().processed_count, 10);
    }

    #[test]
    fn test_window_never_grows_past_twice_workers() {
        let probe = Arc::new(ConcurrencyProbe::new(Duration::from_millis(1)));
        let progress = started_handle(60);
        let dispatcher = Dispatcher::new(probe.clone(), progress.clone(), CancellationToken::new())
            .with_poll_interval(Duration::from_millis(5));

        dispatcher
            .run(numbered(60), Arc::new(ImageParams::default()), 3)
            .unwrap();

        assert_eq!(dispatcher.peak_in_flight(), 6);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 60);
        assert_eq!(progress.snapshot().processed_count, 60);
    }

    #[test]
    fn test_short_queue_caps_window_at_remaining_items() {
        let probe = Arc::new(ConcurrencyProbe::new(Duration::from_millis(1)));
        let progress = started_handle(3);
        let dispatcher = Dispatcher::new(probe.clone(), progress.clone(), CancellationToken::new())
            .with_poll_interval(Duration::from_millis(5));

        dispatcher
            .run(numbered(3), Arc::new(ImageParams::default()), 4)
            .unwrap();

        assert_eq!(dispatcher.peak_in_flight(), 3);
        assert_eq!(progress.snapshot().success_count, 3);
    }

    #[test]
    fn test_failures_and_panics_are_per_item() {
        let probe = Arc::new(ConcurrencyProbe::new(Duration::from_millis(1)));
        let progress = started_handle(4);
        let dispatcher = Dispatcher::new(probe, progress.clone(), CancellationToken::new())
            .with_poll_interval(Duration::from_millis(10));

        let outcome = dispatcher
            .run(
                items(&["a.png", "bad.png", "panic.png", "z.png"]),
                Arc::new(ImageParams::default()),
                2,
            )
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Completed);

        let snapshot = progress.finish(ProcessingState::Completed);
        assert_eq!(snapshot.processed_count, 4);
        assert_eq!(snapshot.success_count, 2);
        assert_eq!(snapshot.error_count, 2);

        let bad = snapshot.errors.iter().find(|e| e.file == "bad.png").unwrap();
        assert_eq!(bad.error, "Processing error: corrupt data");
        let panicked = snapshot.errors.iter().find(|e| e.file == "panic.png").unwrap();
        assert_eq!(panicked.error, "Worker failed: codec exploded");
    }

    #[test]
    fn test_sequential_honours_prior_cancellation() {
        let probe = Arc::new(ConcurrencyProbe::new(Duration::ZERO));
        let cancel = CancellationToken::new();
        cancel.request();

        let progress = started_handle(3);
        let outcome = Dispatcher::new(probe.clone(), progress, cancel)
            .run(numbered(3), Arc::new(ImageParams::default()), 1)
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Cancelled);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_windowed_cancellation_returns_within_poll_interval() {
        let probe = Arc::new(ConcurrencyProbe::new(Duration::from_millis(200)));
        let cancel = CancellationToken::new();
        let progress = started_handle(50);
        let dispatcher = Dispatcher::new(probe.clone(), progress.clone(), cancel.clone())
            .with_poll_interval(Duration::from_millis(20));

        let remote = cancel.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            remote.request();
        });

        let started = Instant::now();
        let outcome = dispatcher
            .run(numbered(50), Arc::new(ImageParams::default()), 4)
            .unwrap();
        canceller.join().unwrap();

        assert_eq!(outcome, DispatchOutcome::Cancelled);
        // in-flight items are not awaited
        assert!(started.elapsed() < Duration::from_millis(200));
        assert!(progress.snapshot().processed_count < 50);
    }
}
