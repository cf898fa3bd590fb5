//! Configuration types for media-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Download behavior configuration (directory, concurrency)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadConfig {
    /// Download root; every produced file lives directly below it (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Maximum runs executing at once, excess runs wait for a slot (default: 3)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_runs: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_concurrent_runs: default_max_concurrent(),
        }
    }
}

/// Extraction engine (yt-dlp) settings
///
/// The retry and timeout values are handed to the engine verbatim; there is no
/// outer deadline around a run.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ExtractorConfig {
    /// Path to the yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub binary_path: Option<PathBuf>,

    /// Whether to search PATH for the engine if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Socket timeout (default: 30 seconds)
    #[serde(default = "default_socket_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub socket_timeout: Duration,

    /// Whole-request retries (default: 10)
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Retries per fragment for segmented streams (default: 10)
    #[serde(default = "default_retries")]
    pub fragment_retries: u32,

    /// Retries for local file access errors (default: 10)
    #[serde(default = "default_retries")]
    pub file_access_retries: u32,

    /// Retries for metadata extraction errors (default: 3)
    #[serde(default = "default_extractor_retries")]
    pub extractor_retries: u32,

    /// Pause between retries (default: 5 seconds)
    #[serde(default = "default_retry_sleep", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub retry_sleep: Duration,

    /// Force IPv4 connections (default: true)
    #[serde(default = "default_true")]
    pub force_ipv4: bool,

    /// Skip TLS certificate validation (default: true)
    #[serde(default = "default_true")]
    pub no_check_certificates: bool,

    /// Two-letter country code used for geo-restriction bypass (default: "US")
    #[serde(default = "default_geo_bypass_country")]
    pub geo_bypass_country: Option<String>,

    /// Audio bitrate for audio extraction (default: "192K")
    #[serde(default = "default_audio_quality")]
    pub audio_quality: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            search_path: true,
            socket_timeout: default_socket_timeout(),
            retries: default_retries(),
            fragment_retries: default_retries(),
            file_access_retries: default_retries(),
            extractor_retries: default_extractor_retries(),
            retry_sleep: default_retry_sleep(),
            force_ipv4: true,
            no_check_certificates: true,
            geo_bypass_country: default_geo_bypass_country(),
            audio_quality: default_audio_quality(),
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PersistenceConfig {
    /// Database path (default: "./media-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// API and external server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8000)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Main configuration for MediaDownloader
///
/// Fields are organized into logical sub-configs:
/// - [`download`](DownloadConfig) - download root, concurrency
/// - [`extractor`](ExtractorConfig) - engine binary and retry policy
/// - [`persistence`](PersistenceConfig) - database location
/// - [`server`](ServerIntegrationConfig) - REST API
///
/// `download` and `server` are flattened, so `download_dir` and `api` sit at the
/// top level of the serialized form.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Download behavior settings
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// Extraction engine settings
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Data storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// API and external server integration
    #[serde(flatten)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Download root
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }

    /// Build a configuration from defaults overridden by environment variables
    ///
    /// - `DOWNLOAD_PATH` - download root
    /// - `SQLITE_DB_FILE` - database file
    /// - `MEDIA_DL_BIND_ADDRESS` - API bind address (`host:port`)
    /// - `MEDIA_DL_MAX_CONCURRENT` - concurrent run limit
    /// - `YTDLP_PATH` - engine binary
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`], reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(dir) = lookup("DOWNLOAD_PATH") {
            config.download.download_dir = PathBuf::from(dir);
        }
        if let Some(db) = lookup("SQLITE_DB_FILE") {
            config.persistence.database_path = PathBuf::from(db);
        }
        if let Some(addr) = lookup("MEDIA_DL_BIND_ADDRESS") {
            config.server.api.bind_address = addr.parse().map_err(|e| Error::Config {
                message: format!("invalid bind address '{}': {}", addr, e),
                key: Some("MEDIA_DL_BIND_ADDRESS".to_string()),
            })?;
        }
        if let Some(max) = lookup("MEDIA_DL_MAX_CONCURRENT") {
            config.download.max_concurrent_runs = max.parse().map_err(|e| Error::Config {
                message: format!("invalid concurrency limit '{}': {}", max, e),
                key: Some("MEDIA_DL_MAX_CONCURRENT".to_string()),
            })?;
        }
        if let Some(bin) = lookup("YTDLP_PATH") {
            config.extractor.binary_path = Some(PathBuf::from(bin));
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.download.download_dir.as_os_str().is_empty() {
            return Err(Error::Config {
                message: "download directory must not be empty".to_string(),
                key: Some("download_dir".to_string()),
            });
        }
        if self.download.max_concurrent_runs == 0 {
            return Err(Error::Config {
                message: "at least one concurrent run is required".to_string(),
                key: Some("max_concurrent_runs".to_string()),
            });
        }
        if let Some(country) = &self.extractor.geo_bypass_country
            && (country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()))
        {
            return Err(Error::Config {
                message: format!("geo bypass country '{}' is not a two-letter code", country),
                key: Some("extractor.geo_bypass_country".to_string()),
            });
        }
        Ok(())
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_max_concurrent() -> usize {
    3
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./media-dl.db")
}

fn default_true() -> bool {
    true
}

fn default_socket_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_retries() -> u32 {
    10
}

fn default_extractor_retries() -> u32 {
    3
}

fn default_retry_sleep() -> Duration {
    Duration::from_secs(5)
}

fn default_geo_bypass_country() -> Option<String> {
    Some("US".to_string())
}

fn default_audio_quality() -> String {
    "192K".to_string()
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
