//! # media-dl
//!
//! Backend library for a media download service: clients submit a media page
//! URL, a background run drives an external extraction engine, and the
//! resulting file is served back with HTTP range support.
//!
//! ## Overview
//!
//! - [`MediaDownloader`] owns the job store, the run scheduler and the file
//!   server. It is cheap to clone.
//! - Runs report progress through a broadcast channel of [`Event`]s and are
//!   persisted in SQLite.
//! - [`api`] exposes everything over a small REST API with SSE events.
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{Config, MediaDownloader, NewJobRequest, OutputFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = MediaDownloader::new(Config::from_env()?).await?;
//!
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             tracing::info!(?event, "job event");
//!         }
//!     });
//!
//!     let mut request = NewJobRequest::new("https://example.com/watch?v=abc");
//!     request.format = OutputFormat::Mp3;
//!     let job = downloader.submit_job(request).await?;
//!     tracing::info!(job_id = job.id.0, "submitted");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Job service (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Extraction engine adapters
pub mod extractor;
/// Range-aware file delivery from the download root
pub mod media;
/// Progress reduction for a single run
pub mod progress;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{ApiConfig, Config, DownloadConfig, ExtractorConfig, PersistenceConfig};
pub use db::Database;
pub use downloader::MediaDownloader;
pub use error::{
    ApiError, DatabaseError, Error, ErrorDetail, ExtractionError, JobError, MediaError, Result,
    ToHttpStatus,
};
pub use extractor::{AdapterEvent, DownloadSpec, ExtractionAdapter, MediaInfo, YtDlpAdapter};
pub use media::{MediaResponse, MediaServer};
pub use types::{
    Event, JobFilter, JobId, JobInfo, JobUpdate, NewJobRequest, OutputFormat, Resolution, Status,
};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal and then calls the downloader's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use media_dl::{MediaDownloader, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let downloader = MediaDownloader::new(config).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(downloader).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: MediaDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
