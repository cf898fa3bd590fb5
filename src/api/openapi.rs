//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the media-dl REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the media-dl REST API
///
/// The spec can be accessed via:
/// - `/api/v1/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "media-dl REST API",
        version = "0.1.0",
        description = "OpenAPI 3.1 compliant REST API for media download jobs and range-aware file streaming",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8000/api/v1", description = "Local development server")
    ),
    paths(
        // Jobs
        crate::api::routes::create_job,
        crate::api::routes::list_jobs,
        crate::api::routes::get_job,
        crate::api::routes::update_job,
        crate::api::routes::delete_job,
        crate::api::routes::cancel_job,

        // Media
        crate::api::routes::stream_file,
        crate::api::routes::download_file,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        crate::types::JobId,
        crate::types::Status,
        crate::types::OutputFormat,
        crate::types::Resolution,
        crate::types::JobInfo,
        crate::types::JobUpdate,
        crate::types::Event,

        crate::api::routes::CreateJobRequest,

        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "jobs", description = "Job management - Submit, inspect, update, cancel and delete download jobs"),
        (name = "media", description = "Media delivery - Stream or download files from the download root"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec, events"),
    )
)]
pub struct ApiDoc;
