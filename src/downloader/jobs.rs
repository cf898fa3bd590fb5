//! Job records: create, query, update, cancel and delete.

use crate::db::NewJob;
use crate::error::{Error, JobError, MediaError, Result};
use crate::types::{Event, JobFilter, JobId, JobInfo, JobUpdate, NewJobRequest, Status};

use super::MediaDownloader;

/// Check that `url` is an absolute http(s) URL with a host
pub(crate) fn validate_source_url(url: &str) -> Result<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("url must not be empty".to_string()));
    }

    let parsed = url::Url::parse(trimmed)
        .map_err(|e| Error::Validation(format!("invalid url '{}': {}", trimmed, e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::Validation(format!(
                "unsupported url scheme '{}': only http and https are accepted",
                other
            )));
        }
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(Error::Validation(format!("url '{}' has no host", trimmed)));
    }

    Ok(trimmed.to_string())
}

impl MediaDownloader {
    /// Record a new pending job
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the URL is not an absolute http(s) URL.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use media_dl::{MediaDownloader, NewJobRequest, OutputFormat};
    /// # async fn example(downloader: MediaDownloader) -> media_dl::Result<()> {
    /// let mut request = NewJobRequest::new("https://example.com/watch?v=abc");
    /// request.format = OutputFormat::Mp3;
    ///
    /// let job = downloader.create_job(request).await?;
    /// downloader.start_run(job.id).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create_job(&self, request: NewJobRequest) -> Result<JobInfo> {
        let source_url = validate_source_url(&request.url)?;

        let id = self
            .db
            .insert_job(&NewJob {
                source_url: source_url.clone(),
                format: request.format,
                resolution: request.resolution,
            })
            .await?;

        tracing::info!(
            job_id = id.0,
            url = %source_url,
            format = %request.format,
            resolution = %request.resolution,
            "Job created"
        );
        self.emit_event(Event::JobCreated {
            id,
            url: source_url,
        });

        self.get_job(id).await
    }

    /// Record a new job and schedule its run
    pub async fn submit_job(&self, request: NewJobRequest) -> Result<JobInfo> {
        let job = self.create_job(request).await?;
        self.start_run(job.id).await?;
        Ok(job)
    }

    /// Fetch one job
    pub async fn get_job(&self, id: JobId) -> Result<JobInfo> {
        let job = self
            .db
            .get_job(id)
            .await?
            .ok_or(JobError::NotFound { id: id.0 })?;
        JobInfo::try_from(job)
    }

    /// List jobs, newest first
    pub async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<JobInfo>> {
        self.db
            .list_jobs(filter)
            .await?
            .into_iter()
            .map(JobInfo::try_from)
            .collect()
    }

    /// Apply a partial update to a job
    ///
    /// Updates to a terminal job (other than restating its status) and backward
    /// status changes are ignored; the unchanged record is returned.
    pub async fn update_job(&self, id: JobId, update: JobUpdate) -> Result<JobInfo> {
        let job = self
            .db
            .update_job(id, &update)
            .await?
            .ok_or(JobError::NotFound { id: id.0 })?;
        JobInfo::try_from(job)
    }

    /// Cancel a pending or downloading job
    ///
    /// Only the record changes: an in-flight extraction keeps running and its
    /// later writes are ignored.
    pub async fn cancel_job(&self, id: JobId) -> Result<JobInfo> {
        let current = self.get_job(id).await?;
        if !matches!(current.status, Status::Pending | Status::Downloading) {
            return Err(JobError::InvalidState {
                id: id.0,
                operation: "cancel".to_string(),
                current_state: current.status.to_string(),
            }
            .into());
        }

        let update = JobUpdate {
            status: Some(Status::Cancelled),
            status_message: Some("Cancelled by user".to_string()),
            ..Default::default()
        };
        let job = self.update_job(id, update).await?;

        // The run may have moved the job on between the read and the write
        if job.status != Status::Cancelled {
            return Err(JobError::InvalidState {
                id: id.0,
                operation: "cancel".to_string(),
                current_state: job.status.to_string(),
            }
            .into());
        }

        tracing::info!(job_id = id.0, "Job cancelled");
        self.emit_event(Event::Cancelled { id });
        Ok(job)
    }

    /// Delete a job record, optionally removing its output file
    ///
    /// A missing or out-of-root file is skipped with a warning; the record is
    /// deleted regardless.
    pub async fn delete_job(&self, id: JobId, delete_file: bool) -> Result<()> {
        let job = self.get_job(id).await?;

        if delete_file && let Some(ref file_path) = job.file_path {
            self.remove_output_file(id, file_path).await?;
        }

        if !self.db.delete_job(id).await? {
            return Err(JobError::NotFound { id: id.0 }.into());
        }

        tracing::info!(job_id = id.0, delete_file, "Job deleted");
        self.emit_event(Event::Removed { id });
        Ok(())
    }

    async fn remove_output_file(&self, id: JobId, file_path: &str) -> Result<()> {
        let path = match self.media.resolve(file_path).await {
            Ok(path) => path,
            Err(Error::Media(MediaError::NotFound)) => {
                tracing::warn!(job_id = id.0, "Output file already gone");
                return Ok(());
            }
            Err(Error::Media(MediaError::AccessDenied)) => {
                tracing::warn!(
                    job_id = id.0,
                    "Output path outside the download root, not removed"
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(job_id = id.0, file = %file_path, "Output file removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}
