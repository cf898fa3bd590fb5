//! Job CRUD operations.

use crate::error::DatabaseError;
use crate::types::{JobFilter, JobId, JobUpdate, Status};
use crate::{Error, Result};

use super::{Database, Job, NewJob};

/// Attempts before a guarded update gives up on a record whose status keeps moving
const MAX_UPDATE_ATTEMPTS: usize = 5;

const JOB_COLUMNS: &str = "id, source_url, format, resolution, status, progress, \
     status_message, file_path, error_message, created_at, updated_at";

impl Database {
    /// Insert a new job record in `pending` state with zero progress
    pub async fn insert_job(&self, job: &NewJob) -> Result<JobId> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO jobs (
                source_url, format, resolution, status, progress,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.source_url)
        .bind(job.format.extension())
        .bind(job.resolution.as_str())
        .bind(Status::Pending.to_i32())
        .bind(0i64) // progress
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert job: {}",
                e
            )))
        })?;

        Ok(JobId(result.last_insert_rowid()))
    }

    /// Get a job by ID
    pub async fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, Job>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to get job: {}",
                    e
                )))
            })?;

        Ok(row)
    }

    /// List jobs, newest first
    pub async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let status = filter.status.map(|s| s.to_i32());

        let rows = sqlx::query_as::<_, Job>(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM jobs
            WHERE (? IS NULL OR status = ?)
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(status)
        .bind(status)
        .bind(i64::from(filter.limit))
        .bind(i64::from(filter.skip))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list jobs: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Apply a partial update to a job
    ///
    /// Returns `None` when the job does not exist (for example because it was
    /// deleted while a run was still in flight).
    ///
    /// An update that would move a terminal job to a different status, touch a
    /// terminal job without naming its status, or move a job backwards through
    /// the lifecycle is ignored and the unchanged record is returned.
    ///
    /// The write is conditional on the status read just before it, so two
    /// writers racing on the same job cannot resurrect a terminal record.
    pub async fn update_job(&self, id: JobId, update: &JobUpdate) -> Result<Option<Job>> {
        for _ in 0..MAX_UPDATE_ATTEMPTS {
            let Some(current) = self.get_job(id).await? else {
                return Ok(None);
            };

            let current_status = current.status();
            let allowed = match update.status {
                Some(next) => current_status.can_transition_to(next),
                None => !current_status.is_terminal(),
            };

            if !allowed {
                tracing::debug!(
                    job_id = id.0,
                    current = %current_status,
                    requested = ?update.status,
                    "Ignoring update that would move job backwards or out of a terminal state"
                );
                return Ok(Some(current));
            }
            if update.is_empty() {
                return Ok(Some(current));
            }

            let now = chrono::Utc::now().timestamp();
            let updated = sqlx::query_as::<_, Job>(&format!(
                r#"
                UPDATE jobs SET
                    status = COALESCE(?, status),
                    progress = COALESCE(?, progress),
                    status_message = COALESCE(?, status_message),
                    file_path = COALESCE(?, file_path),
                    error_message = COALESCE(?, error_message),
                    updated_at = ?
                WHERE id = ? AND status = ?
                RETURNING {JOB_COLUMNS}
                "#
            ))
            .bind(update.status.map(|s| s.to_i32()))
            .bind(update.progress.map(|p| i64::from(p.min(100))))
            .bind(&update.status_message)
            .bind(&update.file_path)
            .bind(&update.error_message)
            .bind(now)
            .bind(id)
            .bind(current.status)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to update job: {}",
                    e
                )))
            })?;

            if let Some(job) = updated {
                return Ok(Some(job));
            }

            // Status moved (or the row vanished) between read and write; re-evaluate
            tracing::debug!(job_id = id.0, "Job changed during update, retrying");
        }

        Err(Error::Database(DatabaseError::QueryFailed(format!(
            "Job {} kept changing during update",
            id
        ))))
    }

    /// Delete a job record, returning whether a row was removed
    pub async fn delete_job(&self, id: JobId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete job: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark jobs left in `downloading`/`processing` by a previous process as failed
    ///
    /// Runs are not persisted across restarts, so such jobs can never finish.
    pub async fn fail_interrupted_jobs(&self, message: &str) -> Result<u64> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            UPDATE jobs SET status = ?, progress = 0, error_message = ?, updated_at = ?
            WHERE status IN (?, ?)
            "#,
        )
        .bind(Status::Failed.to_i32())
        .bind(message)
        .bind(now)
        .bind(Status::Downloading.to_i32())
        .bind(Status::Processing.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to fail interrupted jobs: {}",
                e
            )))
        })?;

        Ok(result.rows_affected())
    }
}
