//! Waiting helpers built on the event stream

use std::time::Duration;
use media_dl::{Event, JobId, MediaDownloader, Status};
use tokio::sync::broadcast;

/// Result of waiting for a job to finish
#[derive(Debug, PartialEq)]
pub enum WaitResult {
    /// Job completed with this relative file path
    Completed(String),
    /// Job failed with error
    Failed(String),
    /// Timeout waiting for completion
    Timeout,
    /// Channel closed unexpectedly
    ChannelClosed,
}

/// Wait for `id` to complete or fail, collecting every event seen for it
///
/// Subscribe before starting the run so no event is missed.
pub async fn wait_for_completion(
    events: &mut broadcast::Receiver<Event>,
    id: JobId,
    timeout: Duration,
) -> (WaitResult, Vec<Event>) {
    let mut seen = Vec::new();

    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let outcome = match &event {
                        Event::Completed { id: event_id, file_path } if *event_id == id => {
                            Some(WaitResult::Completed(file_path.clone()))
                        }
                        Event::Failed { id: event_id, error } if *event_id == id => {
                            Some(WaitResult::Failed(error.clone()))
                        }
                        _ => None,
                    };
                    seen.push(event);
                    if let Some(outcome) = outcome {
                        return outcome;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return WaitResult::ChannelClosed,
            }
        }
    })
    .await;

    (result.unwrap_or(WaitResult::Timeout), seen)
}

/// Progress values reported for `id`, in order
pub fn progress_values(events: &[Event], id: JobId) -> Vec<u8> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Progress {
                id: event_id,
                progress,
                ..
            } if *event_id == id => Some(*progress),
            _ => None,
        })
        .collect()
}

/// Assert a job's persisted status
pub async fn assert_job_status(downloader: &MediaDownloader, id: JobId, expected: Status) {
    let job = downloader.get_job(id).await.expect("job should exist");
    assert_eq!(
        job.status, expected,
        "job {} expected {:?}, got {:?} ({:?})",
        id, expected, job.status, job.error_message
    );
}
