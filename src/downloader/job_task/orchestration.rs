//! Job task orchestration: top-level lifecycle for a single run.

use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::error::{Error, ExtractionError, JobError, Result};
use crate::extractor::{AdapterEvent, DownloadSpec};
use crate::progress::RunState;
use crate::types::{Event, Status};
use crate::utils::{relative_path_string, sanitize_title};

use super::context::JobTaskContext;
use super::verification::locate_output;

/// Core run task -- drives one job from pending to a terminal status.
///
/// Phases:
/// 1. Fetch the job record (no state is touched if this fails)
/// 2. Transition to downloading and probe metadata
/// 3. Download, folding adapter events into the run state as they arrive
/// 4. Verify the output file and record completion
///
/// Any error after the run started is recorded as a failure before it is
/// returned. The failure write is best-effort and never replaces the error.
pub(crate) async fn run_job_task(ctx: &JobTaskContext) -> Result<PathBuf> {
    let id = ctx.id;

    // Phase 1: Fetch job record
    let job = ctx
        .db
        .get_job(id)
        .await?
        .ok_or(JobError::NotFound { id: id.0 })?;

    let mut state = RunState::default();

    let spec = match job
        .output_format()
        .and_then(|format| Ok((format, job.output_resolution()?)))
    {
        Ok((format, resolution)) => {
            DownloadSpec::new(id, job.source_url.clone(), format, resolution, &ctx.config)
        }
        Err(e) => {
            // A record that no longer decodes can never run
            let message = e.to_string();
            if ctx.advance(&mut state, |s| s.fail(&message)).await {
                ctx.emit(Event::Failed { id, error: message });
            }
            return Err(e);
        }
    };

    match execute(ctx, &spec, &mut state).await {
        Ok(path) => Ok(path),
        Err(e) => {
            record_failure(ctx, state, &e).await;
            Err(e)
        }
    }
}

async fn execute(
    ctx: &JobTaskContext,
    spec: &DownloadSpec,
    state: &mut RunState,
) -> Result<PathBuf> {
    let id = ctx.id;

    // Phase 2: Start and probe
    if !ctx.advance(state, RunState::start).await {
        // Cancelled (or removed) between scheduling and start
        *state = RunState::default();
        let current = ctx
            .db
            .get_job(id)
            .await?
            .map(|job| job.status().to_string())
            .unwrap_or_else(|| "removed".to_string());
        return Err(JobError::InvalidState {
            id: id.0,
            operation: "start".to_string(),
            current_state: current,
        }
        .into());
    }
    tracing::info!(
        job_id = id.0,
        url = %spec.url,
        format = %spec.format,
        resolution = %spec.resolution,
        "Run started"
    );

    ctx.advance(state, RunState::probe_started).await;
    let info = ctx.adapter.probe(spec).await?;
    let safe_title = sanitize_title(&info.title, id.0);
    tracing::debug!(job_id = id.0, title = %info.title, "Metadata probed");

    // Phase 3: Download with a sequential event pump
    ctx.advance(state, RunState::transfer_started).await;

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut engine_error: Option<String> = None;

    let download = ctx.adapter.download(spec, events_tx);
    let pump = async {
        while let Some(event) = events_rx.recv().await {
            let before = *state;
            let applied = ctx.advance(state, |s| s.apply(&event)).await;
            if let AdapterEvent::Error { message } = &event
                && !before.status.is_terminal()
            {
                tracing::warn!(job_id = id.0, error = %message, "Engine reported an error");
                engine_error = Some(message.clone());
                if applied {
                    ctx.emit(Event::Failed {
                        id,
                        error: message.clone(),
                    });
                }
            }
        }
    };
    let (download_result, ()) = tokio::join!(download, pump);

    if state.status == Status::Failed {
        return Err(download_result.err().unwrap_or_else(|| {
            ExtractionError::Engine {
                message: engine_error.unwrap_or_else(|| "download failed".to_string()),
                exit_code: None,
            }
            .into()
        }));
    }
    download_result?;

    // Phase 4: Verify and complete
    ctx.advance(state, RunState::finalize).await;

    let root = ctx.config.download_dir();
    let path = locate_output(root, id, &safe_title, spec.extension()).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let relative = relative_path_string(root, &path).unwrap_or_else(|| file_name.clone());

    if ctx.advance(state, |s| s.complete(&relative, &file_name)).await {
        ctx.emit(Event::Completed {
            id,
            file_path: relative.clone(),
        });
        tracing::info!(job_id = id.0, file = %relative, "Run completed");
    } else {
        tracing::info!(
            job_id = id.0,
            file = %relative,
            "Run finished but the job no longer accepts updates"
        );
    }

    Ok(path)
}

/// Record an error that aborted a started run as a job failure.
async fn record_failure(ctx: &JobTaskContext, mut state: RunState, error: &Error) {
    if !state.is_started() {
        return;
    }
    let message = error.to_string();
    if ctx.advance(&mut state, |s| s.fail(&message)).await {
        ctx.emit(Event::Failed {
            id: ctx.id,
            error: message,
        });
    }
}
