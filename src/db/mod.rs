//! Database layer for media-dl
//!
//! Handles SQLite persistence for job records.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`jobs`] - Job CRUD and guarded status updates

use crate::error::DatabaseError;
use crate::types::{JobId, JobInfo, OutputFormat, Resolution, Status};
use crate::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};

mod jobs;
mod migrations;

/// New job to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewJob {
    /// Validated source URL
    pub source_url: String,
    /// Output container
    pub format: OutputFormat,
    /// Maximum video height
    pub resolution: Resolution,
}

/// Job record from database
#[derive(Debug, Clone, FromRow)]
pub struct Job {
    /// Unique database ID
    pub id: i64,
    /// Source URL
    pub source_url: String,
    /// Output container name ("mp4", "mp3", ...)
    pub format: String,
    /// Resolution label ("720p", "best", ...)
    pub resolution: String,
    /// Current status (see [`Status::to_i32`])
    pub status: i32,
    /// Progress percentage (0-100)
    pub progress: i64,
    /// Last phase message
    pub status_message: Option<String>,
    /// Output file relative to the download root
    pub file_path: Option<String>,
    /// Error message if the job failed
    pub error_message: Option<String>,
    /// Unix timestamp when the job was created
    pub created_at: i64,
    /// Unix timestamp of the last modification
    pub updated_at: i64,
}

impl Job {
    /// Typed job id
    pub fn job_id(&self) -> JobId {
        JobId(self.id)
    }

    /// Decoded status
    pub fn status(&self) -> Status {
        Status::from_i32(self.status)
    }

    /// Decoded output format
    pub fn output_format(&self) -> Result<OutputFormat> {
        self.format.parse().map_err(|e: String| {
            Error::Database(DatabaseError::CorruptRecord(format!(
                "job {}: {}",
                self.id, e
            )))
        })
    }

    /// Decoded resolution
    pub fn output_resolution(&self) -> Result<Resolution> {
        self.resolution.parse().map_err(|e: String| {
            Error::Database(DatabaseError::CorruptRecord(format!(
                "job {}: {}",
                self.id, e
            )))
        })
    }

    /// Progress clamped into 0-100
    pub fn progress_percent(&self) -> u8 {
        self.progress.clamp(0, 100) as u8
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

impl TryFrom<Job> for JobInfo {
    type Error = Error;

    fn try_from(job: Job) -> Result<Self> {
        Ok(JobInfo {
            id: job.job_id(),
            format: job.output_format()?,
            resolution: job.output_resolution()?,
            status: job.status(),
            progress: job.progress_percent(),
            created_at: timestamp(job.created_at),
            updated_at: timestamp(job.updated_at),
            url: job.source_url,
            status_message: job.status_message,
            file_path: job.file_path,
            error_message: job.error_message,
        })
    }
}

/// Database handle for media-dl
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
