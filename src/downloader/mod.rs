//! Core downloader implementation split into focused submodules.
//!
//! The `MediaDownloader` struct and its methods are organized by domain:
//! - [`jobs`] - Job records (create, query, update, cancel, delete)
//! - [`runs`] - Run scheduling, concurrency limiting and panic isolation
//! - [`job_task`] - Execution of a single run against the extraction adapter
//! - [`lifecycle`] - Startup recovery and shutdown coordination
//! - [`delivery`] - File delivery from the download root

mod delivery;
mod job_task;
mod jobs;
mod lifecycle;
mod runs;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::extractor::{ExtractionAdapter, adapter_from_config};
use crate::media::MediaServer;
use crate::types::{Event, JobId};

/// Run scheduling state
#[derive(Clone)]
pub(crate) struct RunQueue {
    /// Semaphore to limit concurrent runs (respects max_concurrent_runs config)
    pub(crate) concurrent_limit: std::sync::Arc<tokio::sync::Semaphore>,
    /// Jobs with a run in flight, queued or executing
    pub(crate) active_runs:
        std::sync::Arc<tokio::sync::Mutex<std::collections::HashSet<JobId>>>,
    /// Flag to indicate whether new runs are accepted (set to false during shutdown)
    pub(crate) accepting_new: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl RunQueue {
    pub(crate) fn new(max_concurrent_runs: usize) -> Self {
        Self {
            concurrent_limit: std::sync::Arc::new(tokio::sync::Semaphore::new(
                max_concurrent_runs,
            )),
            active_runs: std::sync::Arc::new(tokio::sync::Mutex::new(
                std::collections::HashSet::new(),
            )),
            accepting_new: std::sync::Arc::new(std::sync::atomic::AtomicBool::new(true)),
        }
    }
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct MediaDownloader {
    /// Database instance for persistence (wrapped in Arc for sharing across tasks)
    /// Public for integration tests to query job state
    pub db: std::sync::Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: std::sync::Arc<Config>,
    /// Extraction engine (trait object for pluggable implementations)
    pub(crate) adapter: std::sync::Arc<dyn ExtractionAdapter>,
    /// File delivery rooted at the download directory
    pub(crate) media: MediaServer,
    /// Run scheduling state
    pub(crate) run_queue: RunQueue,
}

impl MediaDownloader {
    /// Create a new MediaDownloader instance
    ///
    /// This initializes all core components:
    /// - Validates the configuration
    /// - Creates the download directory
    /// - Opens/creates the SQLite database and runs migrations
    /// - Fails jobs left mid-run by a previous process
    /// - Locates the extraction engine
    pub async fn new(config: Config) -> Result<Self> {
        let adapter = adapter_from_config(&config.extractor);
        Self::with_adapter(config, adapter).await
    }

    /// Create a MediaDownloader that runs jobs through the given adapter
    pub async fn with_adapter(
        config: Config,
        adapter: std::sync::Arc<dyn ExtractionAdapter>,
    ) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.download.download_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create download directory '{}': {}",
                        config.download.download_dir.display(),
                        e
                    ),
                ))
            })?;

        let db = Database::new(&config.persistence.database_path).await?;

        // Create broadcast channel with buffer size of 1000 events
        // This allows multiple subscribers to receive all events independently
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        tracing::info!(adapter = adapter.name(), "Extraction adapter initialized");

        let downloader = Self {
            db: std::sync::Arc::new(db),
            event_tx,
            media: MediaServer::new(config.download.download_dir.clone()),
            run_queue: RunQueue::new(config.download.max_concurrent_runs),
            config: std::sync::Arc::new(config),
            adapter,
        };

        downloader.recover_interrupted_jobs().await?;

        Ok(downloader)
    }

    /// Subscribe to job events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// Events are buffered, but if a subscriber falls behind by more than 1000 events,
    /// it will receive a `RecvError::Lagged` error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use media_dl::{MediaDownloader, Config};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let downloader = MediaDownloader::new(Config::default()).await?;
    ///
    ///     let mut events = downloader.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             tracing::info!(?event, "job event");
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> std::sync::Arc<Config> {
        std::sync::Arc::clone(&self.config)
    }

    /// Name of the extraction adapter in use
    pub fn adapter_name(&self) -> &'static str {
        self.adapter.name()
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine - we just drop the event
        self.event_tx.send(event).ok();
    }

    /// Spawn the REST API server in a background task
    ///
    /// The server listens on the configured bind address (default: 127.0.0.1:8000).
    pub fn spawn_api_server(self: &std::sync::Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let downloader = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(downloader, config).await })
    }
}
