//! Shared test helpers for creating MediaDownloader instances in tests.

use crate::config::Config;
use crate::downloader::MediaDownloader;
use crate::error::{ExtractionError, Result};
use crate::extractor::{AdapterEvent, DownloadSpec, ExtractionAdapter, MediaInfo};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::tempdir;
use tokio::sync::{Semaphore, mpsc};

/// How a [`ScriptedAdapter`] download ends
#[derive(Clone, Debug)]
pub(crate) enum Outcome {
    /// Write the output file (if any) and return Ok
    Succeed,
    /// Return an engine error with this message
    Fail(String),
    /// Panic inside the download
    Panic(&'static str),
}

/// Deterministic stand-in for the extraction engine.
pub(crate) struct ScriptedAdapter {
    pub(crate) title: String,
    pub(crate) probe_error: Option<String>,
    pub(crate) events: Vec<AdapterEvent>,
    /// File name written into the download directory before returning
    pub(crate) output: Option<String>,
    pub(crate) outcome: Outcome,
    /// When set, each download waits for one permit before finishing
    pub(crate) gate: Option<Arc<Semaphore>>,
    pub(crate) in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
    pub(crate) downloads: AtomicUsize,
}

impl ScriptedAdapter {
    /// Adapter that reports progress and writes `{id}_{title}.{ext}`
    pub(crate) fn succeeding(title: &str) -> Self {
        Self {
            title: title.to_string(),
            probe_error: None,
            events: vec![
                AdapterEvent::Downloading { fraction: 0.25 },
                AdapterEvent::Downloading { fraction: 0.5 },
                AdapterEvent::Downloading { fraction: 1.0 },
                AdapterEvent::Finished,
            ],
            output: None,
            outcome: Outcome::Succeed,
            gate: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_events(mut self, events: Vec<AdapterEvent>) -> Self {
        self.events = events;
        self
    }

    pub(crate) fn with_output(mut self, name: &str) -> Self {
        self.output = Some(name.to_string());
        self
    }

    pub(crate) fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub(crate) fn with_probe_error(mut self, message: &str) -> Self {
        self.probe_error = Some(message.to_string());
        self
    }

    pub(crate) fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn output_name(&self, spec: &DownloadSpec) -> String {
        self.output.clone().unwrap_or_else(|| {
            let safe = crate::utils::sanitize_title(&self.title, spec.job_id.0);
            crate::utils::expected_file_name(spec.job_id.0, &safe, spec.extension())
        })
    }
}

#[async_trait]
impl ExtractionAdapter for ScriptedAdapter {
    async fn probe(&self, _spec: &DownloadSpec) -> Result<MediaInfo> {
        if let Some(ref message) = self.probe_error {
            return Err(ExtractionError::Engine {
                message: message.clone(),
                exit_code: Some(1),
            }
            .into());
        }
        Ok(MediaInfo {
            title: self.title.clone(),
            ..Default::default()
        })
    }

    async fn download(
        &self,
        spec: &DownloadSpec,
        events: mpsc::UnboundedSender<AdapterEvent>,
    ) -> Result<()> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        for event in &self.events {
            events.send(event.clone()).ok();
        }

        if let Some(ref gate) = self.gate {
            let permit = gate.acquire().await.unwrap();
            permit.forget();
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &self.outcome {
            Outcome::Succeed => {
                let path = spec.download_dir.join(self.output_name(spec));
                tokio::fs::write(&path, b"media bytes").await?;
                Ok(())
            }
            Outcome::Fail(message) => Err(ExtractionError::Engine {
                message: message.clone(),
                exit_code: Some(1),
            }
            .into()),
            Outcome::Panic(message) => panic!("{}", message),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Config rooted in a fresh temp directory
pub(crate) fn test_config(temp_dir: &tempfile::TempDir) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = temp_dir.path().join("test.db");
    config.download.download_dir = temp_dir.path().join("downloads");
    config.download.max_concurrent_runs = 3;
    config
}

/// Helper to create a test MediaDownloader with a persistent database.
/// Returns the downloader and the tempdir (which must be kept alive).
pub(crate) async fn create_test_downloader(
    adapter: Arc<dyn ExtractionAdapter>,
) -> (MediaDownloader, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(&temp_dir);
    let downloader = MediaDownloader::with_adapter(config, adapter).await.unwrap();
    (downloader, temp_dir)
}

/// Poll until the job reaches a terminal status
pub(crate) async fn wait_for_terminal(
    downloader: &MediaDownloader,
    id: crate::types::JobId,
) -> crate::types::JobInfo {
    for _ in 0..200 {
        let job = downloader.get_job(id).await.unwrap();
        if job.status.is_terminal() && downloader.active_run_count().await == 0 {
            return job;
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }
    panic!("job {id} did not reach a terminal status");
}
