//! Run scheduling: start, concurrency limiting and panic isolation.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use futures::FutureExt;

use crate::error::{Error, JobError, Result};
use crate::progress::failure_update;
use crate::types::{Event, JobId, Status};

use super::MediaDownloader;
use super::job_task::{JobTaskContext, run_job_task};

impl MediaDownloader {
    /// Schedule a run for a pending job and return immediately
    ///
    /// The run executes on its own task once a slot is free (see
    /// `max_concurrent_runs`). Progress is observable through [`get_job`] and
    /// [`subscribe`].
    ///
    /// # Errors
    ///
    /// - [`Error::ShuttingDown`] once [`shutdown`] has been called
    /// - [`JobError::NotFound`] if the job does not exist
    /// - [`JobError::AlreadyRunning`] if the job already has a run in flight
    /// - [`JobError::InvalidState`] if the job is not pending
    ///
    /// [`get_job`]: MediaDownloader::get_job
    /// [`subscribe`]: MediaDownloader::subscribe
    /// [`shutdown`]: MediaDownloader::shutdown
    pub async fn start_run(&self, id: JobId) -> Result<()> {
        self.claim_run(id).await?;

        let downloader = self.clone();
        tokio::spawn(async move {
            // Already recorded and logged by execute_claimed; nobody awaits the result
            downloader.execute_claimed(id).await.ok();
        });

        Ok(())
    }

    /// Run a pending job to completion and return the produced file
    ///
    /// Same admission rules as [`start_run`](MediaDownloader::start_run), but the
    /// caller waits for the outcome. A failed run has already been recorded on the
    /// job when the original error is returned.
    pub async fn run_job(&self, id: JobId) -> Result<PathBuf> {
        self.claim_run(id).await?;
        self.execute_claimed(id).await
    }

    /// Register a run for `id`, enforcing one run per job
    async fn claim_run(&self, id: JobId) -> Result<()> {
        if !self.run_queue.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let mut active = self.run_queue.active_runs.lock().await;
        if active.contains(&id) {
            return Err(JobError::AlreadyRunning { id: id.0 }.into());
        }

        let job = self
            .db
            .get_job(id)
            .await?
            .ok_or(JobError::NotFound { id: id.0 })?;
        let status = job.status();
        if status != Status::Pending {
            return Err(JobError::InvalidState {
                id: id.0,
                operation: "start".to_string(),
                current_state: status.to_string(),
            }
            .into());
        }

        active.insert(id);
        tracing::debug!(job_id = id.0, "Run scheduled");
        Ok(())
    }

    /// Execute a claimed run: wait for a slot, run, release
    async fn execute_claimed(&self, id: JobId) -> Result<PathBuf> {
        let outcome = AssertUnwindSafe(self.run_with_permit(id))
            .catch_unwind()
            .await;

        {
            let mut active = self.run_queue.active_runs.lock().await;
            active.remove(&id);
        }

        match outcome {
            Ok(Ok(path)) => Ok(path),
            Ok(Err(e)) => {
                log_run_error(id, &e);
                Err(e)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(job_id = id.0, panic = %message, "Run panicked");
                self.record_panic(id, &message).await;
                Err(JobError::Panicked { id: id.0, message }.into())
            }
        }
    }

    async fn run_with_permit(&self, id: JobId) -> Result<PathBuf> {
        // Acquire a permit from the semaphore (waits if at max concurrent runs)
        let _permit = Arc::clone(&self.run_queue.concurrent_limit)
            .acquire_owned()
            .await
            .map_err(|_| Error::ShuttingDown)?;

        let ctx = self.task_context(id);
        run_job_task(&ctx).await
    }

    pub(crate) fn task_context(&self, id: JobId) -> JobTaskContext {
        JobTaskContext {
            id,
            db: Arc::clone(&self.db),
            event_tx: self.event_tx.clone(),
            adapter: Arc::clone(&self.adapter),
            config: Arc::clone(&self.config),
        }
    }

    /// Best-effort failure write after a panic; its own error is only logged
    async fn record_panic(&self, id: JobId, message: &str) {
        let message = format!("Critical error: {}", message);

        // Keep the outcome the run already recorded (e.g. an engine error)
        match self.db.get_job(id).await {
            Ok(Some(job)) if job.status().is_terminal() => {
                tracing::debug!(
                    job_id = id.0,
                    status = %job.status(),
                    "Panicked run already terminal, keeping recorded outcome"
                );
                return;
            }
            Ok(None) => return,
            Ok(Some(_)) => {}
            Err(e) => {
                tracing::error!(job_id = id.0, error = %e, "Failed to read panicked run");
                return;
            }
        }

        match self.db.update_job(id, &failure_update(&message)).await {
            Ok(Some(job)) if job.status() == Status::Failed => {
                self.emit_event(Event::Failed { id, error: message });
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(
                    job_id = id.0,
                    error = %e,
                    "Failed to record panicked run"
                );
            }
        }
    }

    /// Number of runs currently queued or executing
    pub async fn active_run_count(&self) -> usize {
        self.run_queue.active_runs.lock().await.len()
    }
}

/// Log the error a run ended with
///
/// A job deleted, cancelled or otherwise moved on before its run started is an
/// expected race and logged as a warning.
fn log_run_error(id: JobId, error: &Error) {
    match error {
        Error::Job(JobError::NotFound { .. } | JobError::InvalidState { .. }) => {
            tracing::warn!(job_id = id.0, error = %error, "Run did not start");
        }
        _ => tracing::error!(job_id = id.0, error = %error, "Run failed"),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
