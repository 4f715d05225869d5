// pixmark/src/core/progress.rs
use std::fmt;

/// Lifecycle of one batch run. `Completed`, `Cancelled` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
    Error,
}

impl ProcessingState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessingState::Completed | ProcessingState::Cancelled | ProcessingState::Error
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingState::Idle => "idle",
            ProcessingState::Running => "running",
            ProcessingState::Completed => "completed",
            ProcessingState::Cancelled => "cancelled",
            ProcessingState::Error => "error",
        }
    }
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub file: String,
    pub error: String,
}

impl ErrorRecord {
    pub fn new(file: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            error: error.into(),
        }
    }
}

/// Counters and per-file error records of a run.
///
/// `processed_count == success_count + error_count + skipped_count` holds at
/// every observation point once a run has begun.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessingProgress {
    pub total_files: usize,
    pub processed_count: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub skipped_count: usize,
    /// File being processed, or a pool summary once parallel dispatch begins.
    pub current_file: String,
    pub errors: Vec<ErrorRecord>,
    pub state: ProcessingState,
}

impl ProcessingProgress {
    pub fn progress_percent(&self) -> f64 {
        if self.total_files == 0 {
            return 0.0;
        }
        self.processed_count as f64 / self.total_files as f64 * 100.0
    }

    pub fn is_running(&self) -> bool {
        self.state == ProcessingState::Running
    }

    pub(crate) fn reset_running(&mut self) {
        *self = ProcessingProgress {
            state: ProcessingState::Running,
            ..Default::default()
        };
    }

    pub(crate) fn record_success(&mut self) {
        self.processed_count += 1;
        self.success_count += 1;
    }

    pub(crate) fn record_failure(&mut self, file: String, error: String) {
        self.processed_count += 1;
        self.error_count += 1;
        self.errors.push(ErrorRecord { file, error });
    }

    pub(crate) fn record_skip(&mut self, file: String, reason: String) {
        self.processed_count += 1;
        self.skipped_count += 1;
        self.errors.push(ErrorRecord { file, error: reason });
    }
}
