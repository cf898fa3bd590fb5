//! Progress reduction for a single run
//!
//! A run's view of its job is a small [`RunState`] value. Every phase change and
//! every adapter event is folded into it by a pure function that returns the new
//! state plus the store write it implies, if any. Keeping this free of I/O makes
//! the lifecycle rules testable without a database or an engine.

use crate::extractor::AdapterEvent;
use crate::types::{JobUpdate, Status};
use crate::utils::truncate_chars;

/// Progress reported once metadata probing starts
pub const PROBE_PROGRESS: u8 = 5;

/// Progress reported once the transfer starts
pub const TRANSFER_PROGRESS: u8 = 10;

/// Upper bound of the transfer phase; raw transfer fractions are scaled into 0..=80
pub const TRANSFER_CEILING: u8 = 80;

/// Progress once the engine reports the transfer finished
pub const PROCESSING_PROGRESS: u8 = 85;

/// Progress while the output file is being verified
pub const FINALIZING_PROGRESS: u8 = 95;

/// Maximum stored length of an error message, in characters
pub const MAX_ERROR_CHARS: usize = 200;

/// Run-local view of a job's lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunState {
    /// Status as last written by this run
    pub status: Status,
    /// Progress as last written by this run
    pub progress: u8,
    /// Whether a `Finished` event was already applied
    pub seen_finished: bool,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            status: Status::Pending,
            progress: 0,
            seen_finished: false,
        }
    }
}

/// Result of a transition: the next state and the write it implies
pub type Transition = (RunState, Option<JobUpdate>);

impl RunState {
    /// Whether the run has started writing to the job
    pub fn is_started(&self) -> bool {
        self.status != Status::Pending
    }

    /// pending -> downloading at 0%
    pub fn start(self) -> Transition {
        let next = RunState {
            status: Status::Downloading,
            progress: 0,
            seen_finished: false,
        };
        (
            next,
            Some(JobUpdate {
                status: Some(Status::Downloading),
                progress: Some(0),
                status_message: Some("Preparing download...".to_string()),
                ..Default::default()
            }),
        )
    }

    /// Metadata probing began
    pub fn probe_started(self) -> Transition {
        self.milestone(PROBE_PROGRESS, "Getting video info...")
    }

    /// Byte transfer began
    pub fn transfer_started(self) -> Transition {
        self.milestone(TRANSFER_PROGRESS, "Starting download...")
    }

    fn milestone(self, floor: u8, message: &str) -> Transition {
        if self.status.is_terminal() {
            return (self, None);
        }
        let next = RunState {
            progress: self.progress.max(floor),
            ..self
        };
        (
            next,
            Some(JobUpdate {
                progress: Some(next.progress),
                status_message: Some(message.to_string()),
                ..Default::default()
            }),
        )
    }

    /// Fold one adapter event into the state
    pub fn apply(self, event: &AdapterEvent) -> Transition {
        if self.status.is_terminal() {
            return (self, None);
        }

        match event {
            AdapterEvent::Downloading { fraction } => {
                if self.seen_finished || !fraction.is_finite() {
                    return (self, None);
                }
                let scaled = transfer_percent(*fraction);
                if scaled <= self.progress {
                    return (self, None);
                }
                let next = RunState {
                    progress: scaled,
                    ..self
                };
                (
                    next,
                    Some(JobUpdate {
                        progress: Some(scaled),
                        status_message: Some(format!(
                            "Downloading: {:.1}%",
                            fraction.clamp(0.0, 1.0) * 100.0
                        )),
                        ..Default::default()
                    }),
                )
            }
            AdapterEvent::Finished => {
                if self.seen_finished {
                    return (self, None);
                }
                let next = RunState {
                    status: Status::Processing,
                    progress: self.progress.max(PROCESSING_PROGRESS),
                    seen_finished: true,
                };
                (
                    next,
                    Some(JobUpdate {
                        status: Some(Status::Processing),
                        progress: Some(next.progress),
                        status_message: Some("Download complete. Processing...".to_string()),
                        ..Default::default()
                    }),
                )
            }
            AdapterEvent::Error { message } => {
                let message = truncate_chars(message, MAX_ERROR_CHARS);
                let next = RunState {
                    status: Status::Failed,
                    progress: 0,
                    ..self
                };
                (
                    next,
                    Some(JobUpdate {
                        status: Some(Status::Failed),
                        progress: Some(0),
                        status_message: Some(format!("Error: {}", message)),
                        error_message: Some(message),
                        ..Default::default()
                    }),
                )
            }
        }
    }

    /// The adapter returned success; the output is being verified
    pub fn finalize(self) -> Transition {
        if self.status.is_terminal() {
            return (self, None);
        }
        let next = RunState {
            status: Status::Processing,
            progress: self.progress.max(FINALIZING_PROGRESS),
            ..self
        };
        (
            next,
            Some(JobUpdate {
                status: Some(Status::Processing),
                progress: Some(next.progress),
                status_message: Some("Finalizing...".to_string()),
                ..Default::default()
            }),
        )
    }

    /// Output verified; `file_path` is relative to the download root
    pub fn complete(self, file_path: &str, file_name: &str) -> Transition {
        if self.status.is_terminal() {
            return (self, None);
        }
        let next = RunState {
            status: Status::Completed,
            progress: 100,
            ..self
        };
        (
            next,
            Some(JobUpdate {
                status: Some(Status::Completed),
                progress: Some(100),
                status_message: Some(format!("Download completed: {}", file_name)),
                file_path: Some(file_path.to_string()),
                ..Default::default()
            }),
        )
    }

    /// The run failed outside of an engine-reported error
    pub fn fail(self, message: &str) -> Transition {
        if self.status.is_terminal() {
            return (self, None);
        }
        let next = RunState {
            status: Status::Failed,
            progress: 0,
            ..self
        };
        (next, Some(failure_update(message)))
    }
}

/// Store write marking a job failed with `message`
pub fn failure_update(message: &str) -> JobUpdate {
    let message = truncate_chars(message, MAX_ERROR_CHARS);
    JobUpdate {
        status: Some(Status::Failed),
        progress: Some(0),
        status_message: Some(format!("Download failed: {}", message)),
        error_message: Some(message),
        ..Default::default()
    }
}

/// Scale a transfer fraction into the 0..=80 band
pub fn transfer_percent(fraction: f64) -> u8 {
    let scaled = (fraction.clamp(0.0, 1.0) * f64::from(TRANSFER_CEILING)).floor();
    (scaled as u8).min(TRANSFER_CEILING)
}
