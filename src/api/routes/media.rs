//! File delivery handlers: range-aware streaming and attachment downloads.

use crate::api::AppState;
use crate::api::error_response::media_error_response;
use crate::media::MediaResponse;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;

/// GET /stream/*path - Stream a downloaded file
///
/// Honors a single-range `Range: bytes=...` header with a 206 response.
/// Malformed or unsatisfiable ranges are answered with the whole file.
#[utoipa::path(
    get,
    path = "/api/v1/stream/{path}",
    tag = "media",
    params(
        ("path" = String, Path, description = "File path relative to the download root"),
        ("Range" = Option<String>, Header, description = "Byte range, e.g. bytes=0-1023")
    ),
    responses(
        (status = 200, description = "Whole file", content_type = "application/octet-stream"),
        (status = 206, description = "Requested byte range", content_type = "application/octet-stream"),
        (status = 403, description = "Path escapes the download root", body = crate::error::ApiError),
        (status = 404, description = "File not found", body = crate::error::ApiError)
    )
)]
pub async fn stream_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Response {
    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());

    match state.downloader.stream_file(&path, range).await {
        Ok(media) => media_response(media),
        Err(e) => media_error_response(e),
    }
}

/// GET /download/*path - Download a file as an attachment
#[utoipa::path(
    get,
    path = "/api/v1/download/{path}",
    tag = "media",
    params(
        ("path" = String, Path, description = "File path relative to the download root")
    ),
    responses(
        (status = 200, description = "Whole file with Content-Disposition: attachment", content_type = "application/octet-stream"),
        (status = 403, description = "Path escapes the download root", body = crate::error::ApiError),
        (status = 404, description = "File not found", body = crate::error::ApiError)
    )
)]
pub async fn download_file(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    match state.downloader.download_file(&path).await {
        Ok(media) => media_response(media),
        Err(e) => media_error_response(e),
    }
}

fn media_response(media: MediaResponse) -> Response {
    let status = StatusCode::from_u16(media.status).unwrap_or(StatusCode::OK);
    let disposition = media.content_disposition();

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, HeaderValue::from_static(media.content_type))
        .header(header::CONTENT_LENGTH, media.content_length)
        .header(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    if let Some(ref content_range) = media.content_range {
        builder = builder.header(header::CONTENT_RANGE, content_range.as_str());
    }
    if let Some(disposition) = disposition {
        builder = builder.header(header::CONTENT_DISPOSITION, disposition);
    }

    let body = Body::from_stream(ReaderStream::new(media.body));

    match builder.body(body) {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build file response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
