//! Job management handlers.

use super::{CreateJobRequest, DeleteJobQuery, ListJobsQuery, MAX_PAGE_SIZE};
use crate::api::AppState;
use crate::error::{Error, Result};
use crate::types::{
    JobFilter, JobId, JobInfo, JobUpdate, NewJobRequest, OutputFormat, Resolution, Status,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl TryFrom<CreateJobRequest> for NewJobRequest {
    type Error = Error;

    fn try_from(request: CreateJobRequest) -> Result<Self> {
        let format = match request.format.as_deref().map(str::trim) {
            None | Some("") => OutputFormat::default(),
            Some(value) => value.parse().map_err(Error::Validation)?,
        };
        let resolution = match request.resolution.as_deref().map(str::trim) {
            None | Some("") => Resolution::default(),
            Some(value) => value.parse().map_err(Error::Validation)?,
        };

        Ok(NewJobRequest {
            url: request.url,
            format,
            resolution,
        })
    }
}

impl TryFrom<ListJobsQuery> for JobFilter {
    type Error = Error;

    fn try_from(query: ListJobsQuery) -> Result<Self> {
        let defaults = JobFilter::default();
        let status = query
            .status
            .as_deref()
            .map(str::parse::<Status>)
            .transpose()
            .map_err(Error::Validation)?;

        let limit = query.limit.unwrap_or(defaults.limit);
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(Error::Validation(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        Ok(JobFilter {
            status,
            skip: query.skip.unwrap_or(defaults.skip),
            limit,
        })
    }
}

/// POST /jobs - Submit a job
#[utoipa::path(
    post,
    path = "/api/v1/jobs",
    tag = "jobs",
    request_body = CreateJobRequest,
    responses(
        (status = 201, description = "Job created and scheduled", body = JobInfo),
        (status = 400, description = "Invalid URL, format or resolution", body = crate::error::ApiError),
        (status = 503, description = "Service is shutting down", body = crate::error::ApiError)
    )
)]
pub async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<CreateJobRequest>,
) -> Response {
    let request = match NewJobRequest::try_from(request) {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };

    match state.downloader.submit_job(request).await {
        Ok(job) => (StatusCode::CREATED, Json(job)).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to submit job");
            e.into_response()
        }
    }
}

/// GET /jobs - List jobs, newest first
#[utoipa::path(
    get,
    path = "/api/v1/jobs",
    tag = "jobs",
    params(ListJobsQuery),
    responses(
        (status = 200, description = "Jobs matching the filter", body = Vec<JobInfo>),
        (status = 400, description = "Invalid filter", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<Vec<JobInfo>>> {
    let filter = JobFilter::try_from(query)?;
    let jobs = state.downloader.list_jobs(&filter).await?;
    Ok(Json(jobs))
}

/// GET /jobs/:id - Get single job
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}",
    tag = "jobs",
    params(
        ("id" = i64, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job information", body = JobInfo),
        (status = 404, description = "Job not found", body = crate::error::ApiError)
    )
)]
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<JobInfo>> {
    Ok(Json(state.downloader.get_job(JobId(id)).await?))
}

/// PUT /jobs/:id - Partially update a job
///
/// Updates to finished jobs and backward status changes are ignored and the
/// unchanged job is returned.
#[utoipa::path(
    put,
    path = "/api/v1/jobs/{id}",
    tag = "jobs",
    params(
        ("id" = i64, Path, description = "Job ID")
    ),
    request_body = JobUpdate,
    responses(
        (status = 200, description = "Job after the update", body = JobInfo),
        (status = 400, description = "Invalid update", body = crate::error::ApiError),
        (status = 404, description = "Job not found", body = crate::error::ApiError)
    )
)]
pub async fn update_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<JobUpdate>,
) -> Result<Json<JobInfo>> {
    if update.progress.is_some_and(|p| p > 100) {
        return Err(Error::Validation(
            "progress must be between 0 and 100".to_string(),
        ));
    }
    Ok(Json(state.downloader.update_job(JobId(id), update).await?))
}

/// DELETE /jobs/:id - Delete a job
#[utoipa::path(
    delete,
    path = "/api/v1/jobs/{id}",
    tag = "jobs",
    params(
        ("id" = i64, Path, description = "Job ID"),
        DeleteJobQuery
    ),
    responses(
        (status = 204, description = "Job deleted"),
        (status = 404, description = "Job not found", body = crate::error::ApiError)
    )
)]
pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<DeleteJobQuery>,
) -> Result<StatusCode> {
    state
        .downloader
        .delete_job(JobId(id), query.delete_file)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /jobs/:id/cancel - Cancel a pending or downloading job
#[utoipa::path(
    post,
    path = "/api/v1/jobs/{id}/cancel",
    tag = "jobs",
    params(
        ("id" = i64, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job cancelled", body = JobInfo),
        (status = 404, description = "Job not found", body = crate::error::ApiError),
        (status = 409, description = "Job can no longer be cancelled", body = crate::error::ApiError)
    )
)]
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<JobInfo>> {
    Ok(Json(state.downloader.cancel_job(JobId(id)).await?))
}
