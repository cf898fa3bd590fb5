//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`jobs`] - Job submission and management
//! - [`media`] - File streaming and downloads
//! - [`system`] - Health, events, OpenAPI

use serde::{Deserialize, Serialize};

mod jobs;
mod media;
mod system;

// Re-export all handlers so `routes::function_name` works from the router
pub use jobs::*;
pub use media::*;
pub use system::*;

/// Largest page accepted by GET /jobs
pub const MAX_PAGE_SIZE: u32 = 1000;

// ============================================================================
// Query/Request Types (shared across handlers)
// ============================================================================

/// Request body for POST /jobs
///
/// `format` and `resolution` are accepted as strings so unsupported values
/// produce a validation error instead of a deserialization rejection.
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CreateJobRequest {
    /// Remote media URL (http or https)
    pub url: String,
    /// Output container: mp4, mp3, webm, flv, mkv or avi (default: mp4)
    #[serde(default)]
    pub format: Option<String>,
    /// Maximum video height such as "720p", or "best" (default: best)
    #[serde(default)]
    pub resolution: Option<String>,
}

/// Query parameters for GET /jobs
#[derive(Debug, Default, Deserialize, Serialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListJobsQuery {
    /// Only jobs in this status
    pub status: Option<String>,
    /// Number of jobs to skip (default: 0)
    pub skip: Option<u32>,
    /// Maximum number of jobs to return (default: 100)
    pub limit: Option<u32>,
}

/// Query parameters for DELETE /jobs/:id
#[derive(Debug, Deserialize, Serialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteJobQuery {
    /// Whether to delete the downloaded file as well (default: false)
    #[serde(default)]
    pub delete_file: bool,
}
