//! Job task context: shared state and store writes for a single run.

use crate::config::Config;
use crate::db::Database;
use crate::extractor::ExtractionAdapter;
use crate::progress::{RunState, Transition};
use crate::types::{Event, JobId, JobUpdate};
use std::sync::Arc;

/// Shared context for a single run, reducing parameter passing between helpers.
pub(crate) struct JobTaskContext {
    pub(crate) id: JobId,
    pub(crate) db: Arc<Database>,
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    pub(crate) adapter: Arc<dyn ExtractionAdapter>,
    pub(crate) config: Arc<Config>,
}

impl JobTaskContext {
    /// Adopt the next run state and persist the update it carries.
    ///
    /// Returns whether the store accepted the update.
    pub(super) async fn advance<F>(&self, state: &mut RunState, transition: F) -> bool
    where
        F: FnOnce(RunState) -> Transition,
    {
        let (next, update) = transition(*state);
        *state = next;
        match update {
            Some(update) => self.write(&update).await,
            None => false,
        }
    }

    /// Persist one update and announce it to subscribers.
    ///
    /// Store failures are logged and reported as "not applied"; they never abort
    /// the run. An update the store ignores (terminal or deleted job) is not
    /// announced.
    pub(super) async fn write(&self, update: &JobUpdate) -> bool {
        match self.db.update_job(self.id, update).await {
            Ok(Some(job)) => {
                let status = job.status();
                let applied = match update.status {
                    Some(requested) => status == requested,
                    None => !status.is_terminal(),
                };
                if applied {
                    self.emit(Event::Progress {
                        id: self.id,
                        status,
                        progress: job.progress_percent(),
                        message: job.status_message,
                    });
                } else {
                    tracing::debug!(
                        job_id = self.id.0,
                        status = %status,
                        "Job no longer accepts updates from this run"
                    );
                }
                applied
            }
            Ok(None) => {
                tracing::debug!(job_id = self.id.0, "Job removed while its run was in flight");
                false
            }
            Err(e) => {
                tracing::warn!(
                    job_id = self.id.0,
                    error = %e,
                    "Failed to persist job update"
                );
                false
            }
        }
    }

    pub(super) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
