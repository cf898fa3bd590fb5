//! Extraction engine boundary
//!
//! Media extraction is delegated to an external engine. Everything the rest of
//! the crate knows about it goes through [`ExtractionAdapter`]: a probe for
//! metadata, and a download that reports [`AdapterEvent`]s over a channel and
//! returns a typed result.

use crate::config::{Config, ExtractorConfig};
use crate::error::{ExtractionError, Result};
use crate::types::{JobId, OutputFormat, Resolution};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

pub mod parser;
mod ytdlp;

pub use ytdlp::YtDlpAdapter;

/// Progress notification emitted by an adapter while a download runs
#[derive(Clone, Debug, PartialEq)]
pub enum AdapterEvent {
    /// Bytes are being transferred
    Downloading {
        /// Completed fraction of the current transfer (0.0 to 1.0)
        fraction: f64,
    },
    /// A transfer finished; the engine may still post-process
    Finished,
    /// The engine reported a failure
    Error {
        /// Engine-provided message
        message: String,
    },
}

/// Metadata returned by [`ExtractionAdapter::probe`]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Media title, as reported by the source site
    #[serde(default)]
    pub title: String,
    /// Site-specific media identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<f64>,
    /// Name of the engine's site extractor
    #[serde(default)]
    pub extractor: Option<String>,
}

/// Retry and network policy handed to the engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Whole-request retries
    pub retries: u32,
    /// Retries per fragment
    pub fragment_retries: u32,
    /// Retries for local file access
    pub file_access_retries: u32,
    /// Retries for metadata extraction
    pub extractor_retries: u32,
    /// Pause between retries
    pub retry_sleep: Duration,
    /// Socket timeout
    pub socket_timeout: Duration,
    /// Force IPv4
    pub force_ipv4: bool,
    /// Skip TLS certificate validation
    pub no_check_certificates: bool,
    /// Country used for geo-restriction bypass
    pub geo_bypass_country: Option<String>,
}

impl From<&ExtractorConfig> for RetryPolicy {
    fn from(config: &ExtractorConfig) -> Self {
        Self {
            retries: config.retries,
            fragment_retries: config.fragment_retries,
            file_access_retries: config.file_access_retries,
            extractor_retries: config.extractor_retries,
            retry_sleep: config.retry_sleep,
            socket_timeout: config.socket_timeout,
            force_ipv4: config.force_ipv4,
            no_check_certificates: config.no_check_certificates,
            geo_bypass_country: config.geo_bypass_country.clone(),
        }
    }
}

/// Everything an adapter needs to run one job, derived once at run start
#[derive(Clone, Debug, PartialEq)]
pub struct DownloadSpec {
    /// Job being run
    pub job_id: JobId,
    /// Source URL
    pub url: String,
    /// Output container
    pub format: OutputFormat,
    /// Maximum video height
    pub resolution: Resolution,
    /// Engine format selector expression
    pub format_selector: String,
    /// Directory the engine writes into
    pub download_dir: PathBuf,
    /// Output path template (`{dir}/{id}_%(title)s.%(ext)s`)
    pub output_template: String,
    /// Audio bitrate for audio extraction
    pub audio_quality: String,
    /// Retry and network policy
    pub retry: RetryPolicy,
}

impl DownloadSpec {
    /// Derive the run parameters for a job
    pub fn new(
        job_id: JobId,
        url: impl Into<String>,
        format: OutputFormat,
        resolution: Resolution,
        config: &Config,
    ) -> Self {
        let download_dir = config.download.download_dir.clone();
        let output_template = download_dir
            .join(format!("{}_%(title)s.%(ext)s", job_id))
            .to_string_lossy()
            .into_owned();

        Self {
            job_id,
            url: url.into(),
            format,
            resolution,
            format_selector: format_selector(format, resolution),
            download_dir,
            output_template,
            audio_quality: config.extractor.audio_quality.clone(),
            retry: RetryPolicy::from(&config.extractor),
        }
    }

    /// Extension of the file the run is expected to produce
    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }
}

/// Engine format selector for a format/resolution pair
///
/// Video prefers H.264 in MP4 with M4A audio so the merge step is a remux,
/// falling back to any stream within the height limit.
pub fn format_selector(format: OutputFormat, resolution: Resolution) -> String {
    if format.is_audio() {
        return "bestaudio/best".to_string();
    }
    match resolution.height() {
        Some(h) => format!(
            "bestvideo[height<={h}][ext=mp4][vcodec^=avc1]+bestaudio[ext=m4a]/\
             bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/best[height<={h}]/best"
        ),
        None => "bestvideo[ext=mp4][vcodec^=avc1]+bestaudio[ext=m4a]/\
                 bestvideo[ext=mp4]+bestaudio[ext=m4a]/best"
            .to_string(),
    }
}

/// Opaque wrapper around a media extraction engine
///
/// Implementations report progress by sending [`AdapterEvent`]s; a send error
/// means nobody is listening any more and must not abort the download.
#[async_trait]
pub trait ExtractionAdapter: Send + Sync {
    /// Fetch metadata without downloading
    async fn probe(&self, spec: &DownloadSpec) -> Result<MediaInfo>;

    /// Download (and convert) the media described by `spec` into its download directory
    async fn download(
        &self,
        spec: &DownloadSpec,
        events: mpsc::UnboundedSender<AdapterEvent>,
    ) -> Result<()>;

    /// Get the name of this adapter
    fn name(&self) -> &'static str;
}

/// Adapter used when no engine binary could be located
///
/// Every run fails with [`ExtractionError::ToolMissing`]; the rest of the
/// service (job records, file delivery) keeps working.
pub struct UnavailableAdapter;

#[async_trait]
impl ExtractionAdapter for UnavailableAdapter {
    async fn probe(&self, _spec: &DownloadSpec) -> Result<MediaInfo> {
        Err(ExtractionError::ToolMissing(
            "yt-dlp binary not configured and not found in PATH".to_string(),
        )
        .into())
    }

    async fn download(
        &self,
        _spec: &DownloadSpec,
        _events: mpsc::UnboundedSender<AdapterEvent>,
    ) -> Result<()> {
        Err(ExtractionError::ToolMissing(
            "yt-dlp binary not configured and not found in PATH".to_string(),
        )
        .into())
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

/// Pick the adapter for a configuration
///
/// An explicit binary path wins; otherwise PATH is searched when allowed.
pub fn adapter_from_config(config: &ExtractorConfig) -> std::sync::Arc<dyn ExtractionAdapter> {
    if let Some(ref binary) = config.binary_path {
        std::sync::Arc::new(YtDlpAdapter::new(binary.clone()))
    } else if config.search_path {
        YtDlpAdapter::from_path()
            .map(|a| std::sync::Arc::new(a) as std::sync::Arc<dyn ExtractionAdapter>)
            .unwrap_or_else(|| std::sync::Arc::new(UnavailableAdapter))
    } else {
        std::sync::Arc::new(UnavailableAdapter)
    }
}
