//! HTTP error response handling for the API
//!
//! Conversions from domain errors to HTTP responses with appropriate status
//! codes and JSON error bodies.

use crate::error::{ApiError, Error, ToHttpStatus};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let api_error: ApiError = self.into();

        (status_code, Json(api_error)).into_response()
    }
}

/// Direct conversions have no status of their own; they default to 500
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}

/// Error response for the file routes
///
/// I/O failures while opening or reading a file are logged and reported as a
/// generic internal error so no filesystem detail reaches the client.
pub(crate) fn media_error_response(error: Error) -> Response {
    match error {
        Error::Io(e) => {
            tracing::error!(error = %e, "I/O error while serving file");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError::internal("internal server error")),
            )
                .into_response()
        }
        other => other.into_response(),
    }
}
