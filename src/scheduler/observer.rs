// pixmark/src/scheduler/observer.rs
use crate::core::ProcessingProgress;

/// Receives progress from a batch run, decoupled from any UI transport.
///
/// Callbacks run on the aggregator thread right after each mutation, in the
/// order the mutations were applied. A panicking observer is logged and
/// ignored. Calling `BatchProcessor::progress()` from a callback returns the
/// same snapshot the callback was given.
pub trait ProgressObserver: Send + Sync {
    /// Called after every counter or state change.
    fn on_progress(&self, progress: &ProcessingProgress);

    /// Called exactly once per run, when it reaches a terminal state.
    fn on_complete(&self, progress: &ProcessingProgress) {
        let _ = progress;
    }
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProcessingProgress) + Send + Sync,
{
    fn on_progress(&self, progress: &ProcessingProgress) {
        self(progress)
    }
}
