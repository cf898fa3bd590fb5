//! Core types for media-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Unique identifier for a job
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl JobId {
    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<JobId> for i64 {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl sqlx::Type<sqlx::Sqlite> for JobId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for JobId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for JobId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Job status
///
/// ```text
/// pending -> downloading -> processing -> completed
///               |              |
///               +--> failed <--+
/// pending | downloading -> cancelled
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Created, no run started yet
    Pending,
    /// The engine is transferring media
    Downloading,
    /// Transfer finished, engine is merging/converting
    Processing,
    /// Output file verified and recorded
    Completed,
    /// Run failed
    Failed,
    /// Cancelled by a client
    Cancelled,
}

impl Status {
    /// Convert integer status code to Status enum
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => Status::Pending,
            1 => Status::Downloading,
            2 => Status::Processing,
            3 => Status::Completed,
            4 => Status::Failed,
            5 => Status::Cancelled,
            _ => Status::Failed, // Unknown codes surface as failures
        }
    }

    /// Convert Status enum to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            Status::Pending => 0,
            Status::Downloading => 1,
            Status::Processing => 2,
            Status::Completed => 3,
            Status::Failed => 4,
            Status::Cancelled => 5,
        }
    }

    /// Lowercase name, as used in the JSON representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Downloading => "downloading",
            Status::Processing => "processing",
            Status::Completed => "completed",
            Status::Failed => "failed",
            Status::Cancelled => "cancelled",
        }
    }

    /// Completed, failed and cancelled jobs never change again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Status::Completed | Status::Failed | Status::Cancelled
        )
    }

    /// Whether a job in this status may be moved to `next`.
    ///
    /// Staying in the same status is always allowed (progress updates),
    /// everything else must move forward along the lifecycle graph.
    pub fn can_transition_to(&self, next: Status) -> bool {
        if *self == next {
            return true;
        }
        match self {
            Status::Pending => matches!(
                next,
                Status::Downloading | Status::Failed | Status::Cancelled
            ),
            Status::Downloading => matches!(
                next,
                Status::Processing | Status::Failed | Status::Cancelled
            ),
            Status::Processing => matches!(next, Status::Completed | Status::Failed),
            Status::Completed | Status::Failed | Status::Cancelled => false,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Status::Pending),
            "downloading" => Ok(Status::Downloading),
            "processing" => Ok(Status::Processing),
            "completed" => Ok(Status::Completed),
            "failed" => Ok(Status::Failed),
            "cancelled" => Ok(Status::Cancelled),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

/// Requested output container
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// MPEG-4 video
    #[default]
    Mp4,
    /// Audio only, extracted to MP3
    Mp3,
    /// WebM video
    Webm,
    /// Flash video
    Flv,
    /// Matroska video
    Mkv,
    /// AVI video
    Avi,
}

impl OutputFormat {
    /// File extension of the produced file (without the dot)
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Mp3 => "mp3",
            OutputFormat::Webm => "webm",
            OutputFormat::Flv => "flv",
            OutputFormat::Mkv => "mkv",
            OutputFormat::Avi => "avi",
        }
    }

    /// Audio-only formats skip video selection and extract the audio track
    pub fn is_audio(&self) -> bool {
        matches!(self, OutputFormat::Mp3)
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp4" => Ok(OutputFormat::Mp4),
            "mp3" => Ok(OutputFormat::Mp3),
            "webm" => Ok(OutputFormat::Webm),
            "flv" => Ok(OutputFormat::Flv),
            "mkv" => Ok(OutputFormat::Mkv),
            "avi" => Ok(OutputFormat::Avi),
            other => Err(format!("unsupported format '{other}'")),
        }
    }
}

/// Requested maximum video height
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Resolution {
    /// 144 lines
    #[serde(rename = "144p")]
    P144,
    /// 240 lines
    #[serde(rename = "240p")]
    P240,
    /// 360 lines
    #[serde(rename = "360p")]
    P360,
    /// 480 lines
    #[serde(rename = "480p")]
    P480,
    /// 720 lines
    #[serde(rename = "720p")]
    P720,
    /// 1080 lines
    #[serde(rename = "1080p")]
    P1080,
    /// 1440 lines
    #[serde(rename = "1440p")]
    P1440,
    /// 2160 lines
    #[serde(rename = "2160p")]
    P2160,
    /// Whatever the engine considers best
    #[default]
    #[serde(rename = "best")]
    Best,
}

impl Resolution {
    /// Maximum height in pixels, `None` for [`Resolution::Best`]
    pub fn height(&self) -> Option<u32> {
        match self {
            Resolution::P144 => Some(144),
            Resolution::P240 => Some(240),
            Resolution::P360 => Some(360),
            Resolution::P480 => Some(480),
            Resolution::P720 => Some(720),
            Resolution::P1080 => Some(1080),
            Resolution::P1440 => Some(1440),
            Resolution::P2160 => Some(2160),
            Resolution::Best => None,
        }
    }

    /// Label as stored and exposed over the API ("720p", "best")
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::P144 => "144p",
            Resolution::P240 => "240p",
            Resolution::P360 => "360p",
            Resolution::P480 => "480p",
            Resolution::P720 => "720p",
            Resolution::P1080 => "1080p",
            Resolution::P1440 => "1440p",
            Resolution::P2160 => "2160p",
            Resolution::Best => "best",
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "144p" => Ok(Resolution::P144),
            "240p" => Ok(Resolution::P240),
            "360p" => Ok(Resolution::P360),
            "480p" => Ok(Resolution::P480),
            "720p" => Ok(Resolution::P720),
            "1080p" => Ok(Resolution::P1080),
            "1440p" => Ok(Resolution::P1440),
            "2160p" => Ok(Resolution::P2160),
            "best" => Ok(Resolution::Best),
            other => Err(format!("unsupported resolution '{other}'")),
        }
    }
}

/// Event emitted during the job lifecycle
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Job recorded
    JobCreated {
        /// Job ID
        id: JobId,
        /// Source URL
        url: String,
    },

    /// Status or progress of a running job changed
    Progress {
        /// Job ID
        id: JobId,
        /// Status after the change
        status: Status,
        /// Progress percentage (0 to 100)
        progress: u8,
        /// Human readable phase message
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Job completed
    Completed {
        /// Job ID
        id: JobId,
        /// Output file, relative to the download root
        file_path: String,
    },

    /// Job failed
    Failed {
        /// Job ID
        id: JobId,
        /// Error message
        error: String,
    },

    /// Job cancelled
    Cancelled {
        /// Job ID
        id: JobId,
    },

    /// Job deleted
    Removed {
        /// Job ID
        id: JobId,
    },

    /// Graceful shutdown initiated
    Shutdown,
}

/// Request to create a job
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct NewJobRequest {
    /// Remote media URL (http or https)
    pub url: String,

    /// Output container (default: mp4)
    #[serde(default)]
    pub format: OutputFormat,

    /// Maximum video height (default: best)
    #[serde(default)]
    pub resolution: Resolution,
}

impl NewJobRequest {
    /// Request with default format and resolution
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            format: OutputFormat::default(),
            resolution: Resolution::default(),
        }
    }
}

/// Partial update of a job record
///
/// `None` fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct JobUpdate {
    /// New status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    /// New progress (0 to 100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    /// New phase message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    /// Output file relative to the download root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Failure description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl JobUpdate {
    /// True when applying the update would not change anything
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.progress.is_none()
            && self.status_message.is_none()
            && self.file_path.is_none()
            && self.error_message.is_none()
    }
}

/// Listing filter
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobFilter {
    /// Only jobs in this status
    pub status: Option<Status>,
    /// Number of jobs to skip (newest first)
    pub skip: u32,
    /// Maximum number of jobs to return
    pub limit: u32,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            status: None,
            skip: 0,
            limit: 100,
        }
    }
}

/// Public view of a job
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct JobInfo {
    /// Unique job identifier
    pub id: JobId,

    /// Source URL
    pub url: String,

    /// Output container
    pub format: OutputFormat,

    /// Maximum video height
    pub resolution: Resolution,

    /// Current status
    pub status: Status,

    /// Progress percentage (0 to 100)
    pub progress: u8,

    /// Last phase message
    pub status_message: Option<String>,

    /// Output file relative to the download root (set once completed)
    pub file_path: Option<String>,

    /// Failure description (set once failed)
    pub error_message: Option<String>,

    /// When the job was created
    pub created_at: DateTime<Utc>,

    /// When the job was last modified
    pub updated_at: DateTime<Utc>,
}
