// pixmark/src/scheduler/aggregator.rs
//
// The progress record is owned by a single actor thread. Every other
// component talks to it through `ProgressHandle`, which turns each operation
// into a message; the actor applies them one at a time, so no caller can
// observe a half-applied update. The actor also publishes a copy of the
// record after each mutation, which is what callers on the actor thread
// itself (observer callbacks) are answered with.

use super::{panic_message, ProgressObserver};
use crate::core::{ErrorRecord, ProcessingProgress, ProcessingState, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, ThreadId};

/// Result of one work item as merged into the aggregate: `Err` carries the
/// message recorded for the file.
pub type ItemOutcome = std::result::Result<(), String>;

/// File label used for the synthetic record of a batch-fatal failure.
pub const BATCH_ERROR_FILE: &str = "BATCH";

enum Command {
    Begin(Sender<bool>),
    SetTotal(usize),
    SetCurrent(String),
    Record { file: String, outcome: ItemOutcome },
    Skip { file: String, reason: String },
    Finish {
        state: ProcessingState,
        fatal: Option<ErrorRecord>,
        reply: Sender<ProcessingProgress>,
    },
    Snapshot(Sender<ProcessingProgress>),
    SetObserver(Option<Arc<dyn ProgressObserver>>),
}

/// Cloneable handle to the progress actor.
#[derive(Clone)]
pub struct ProgressHandle {
    tx: Sender<Command>,
    actor: ThreadId,
    published: Arc<RwLock<ProcessingProgress>>,
}

impl ProgressHandle {
    /// Spawns the actor thread. It exits once every handle has been dropped.
    pub fn spawn() -> Result<Self> {
        let (tx, rx) = unbounded();
        let published = Arc::new(RwLock::new(ProcessingProgress::default()));
        let actor = ProgressActor {
            progress: ProcessingProgress::default(),
            observer: None,
            published: Arc::clone(&published),
        };
        let handle = thread::Builder::new()
            .name("pixmark-progress".to_string())
            .spawn(move || actor.run(rx))?;

        Ok(Self {
            tx,
            actor: handle.thread().id(),
            published,
        })
    }

    /// Resets the record to a zeroed `Running` state. Returns `false`, leaving
    /// the record untouched, if a run is already in progress.
    pub fn begin(&self) -> bool {
        self.request(Command::Begin).unwrap_or(false)
    }

    pub fn set_total(&self, total: usize) {
        self.send(Command::SetTotal(total));
    }

    pub fn set_current(&self, label: impl Into<String>) {
        self.send(Command::SetCurrent(label.into()));
    }

    pub fn record(&self, file: impl Into<String>, outcome: ItemOutcome) {
        self.send(Command::Record {
            file: file.into(),
            outcome,
        });
    }

    pub fn skip(&self, file: impl Into<String>, reason: impl Into<String>) {
        self.send(Command::Skip {
            file: file.into(),
            reason: reason.into(),
        });
    }

    /// Moves the run into `state` and returns the final snapshot once the
    /// completion callback has run.
    pub fn finish(&self, state: ProcessingState) -> ProcessingProgress {
        self.request(|reply| Command::Finish {
            state,
            fatal: None,
            reply,
        })
        .unwrap_or_else(|| self.published())
    }

    /// Ends the run in `Error` with one synthetic batch-level record.
    /// Results accumulated so far are kept.
    pub fn fail(&self, message: impl Into<String>) -> ProcessingProgress {
        let fatal = ErrorRecord::new(BATCH_ERROR_FILE, message);
        self.request(|reply| Command::Finish {
            state: ProcessingState::Error,
            fatal: Some(fatal),
            reply,
        })
        .unwrap_or_else(|| self.published())
    }

    /// Current record. From inside an observer callback this is the state as
    /// of the mutation being reported.
    pub fn snapshot(&self) -> ProcessingProgress {
        self.request(Command::Snapshot)
            .unwrap_or_else(|| self.published())
    }

    pub fn set_observer(&self, observer: Option<Arc<dyn ProgressObserver>>) {
        self.send(Command::SetObserver(observer));
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            log::warn!("Progress aggregator is gone; dropping update");
        }
    }

    fn published(&self) -> ProcessingProgress {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// `None` when called on the actor thread, which cannot answer itself.
    fn request<T>(&self, make: impl FnOnce(Sender<T>) -> Command) -> Option<T> {
        if thread::current().id() == self.actor {
            log::debug!("Progress request from inside an observer callback");
            return None;
        }

        let (reply_tx, reply_rx) = bounded(1);
        self.tx.send(make(reply_tx)).ok()?;
        reply_rx.recv().ok()
    }
}

struct ProgressActor {
    progress: ProcessingProgress,
    observer: Option<Arc<dyn ProgressObserver>>,
    published: Arc<RwLock<ProcessingProgress>>,
}

impl ProgressActor {
    fn run(mut self, rx: Receiver<Command>) {
        for command in rx {
            self.handle(command);
        }
        log::debug!("Progress aggregator stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Begin(reply) => {
                let started = !self.progress.is_running();
                if started {
                    self.progress.reset_running();
                }
                // reply first so the caller is never held up by an observer
                let _ = reply.send(started);
                if started {
                    self.notify();
                }
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.progress.clone());
            }
            Command::SetObserver(observer) => {
                self.observer = observer;
            }
            Command::Finish {
                state,
                fatal,
                reply,
            } => {
                let finished = self.progress.is_running();
                if finished {
                    if let Some(record) = fatal {
                        self.progress.errors.push(record);
                    }
                    self.progress.state = state;
                    self.progress.current_file.clear();
                    self.notify();
                    self.notify_complete();
                } else {
                    log::debug!("Ignoring {} outside of a run", state);
                }
                let _ = reply.send(self.progress.clone());
            }
            mutation => {
                if !self.progress.is_running() {
                    log::debug!("Ignoring progress update outside of a run");
                    return;
                }
                self.apply(mutation);
                self.notify();
            }
        }
    }

    fn apply(&mut self, mutation: Command) {
        match mutation {
            Command::SetTotal(total) => self.progress.total_files = total,
            Command::SetCurrent(label) => self.progress.current_file = label,
            Command::Record { outcome: Ok(()), .. } => self.progress.record_success(),
            Command::Record {
                file,
                outcome: Err(error),
            } => self.progress.record_failure(file, error),
            Command::Skip { file, reason } => self.progress.record_skip(file, reason),
            _ => {}
        }
    }

    fn publish(&self) {
        *self
            .published
            .write()
            .unwrap_or_else(PoisonError::into_inner) = self.progress.clone();
    }

    fn notify(&self) {
        self.publish();
        if let Some(observer) = &self.observer {
            let result =
                panic::catch_unwind(AssertUnwindSafe(|| observer.on_progress(&self.progress)));
            if let Err(payload) = result {
                log::warn!(
                    "Progress observer panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
        }
    }

    fn notify_complete(&self) {
        if let Some(observer) = &self.observer {
            let result =
                panic::catch_unwind(AssertUnwindSafe(|| observer.on_complete(&self.progress)));
            if let Err(payload) = result {
                log::warn!(
                    "Completion observer panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
        }
    }
}
