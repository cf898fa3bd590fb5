//! Error types for media-dl
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (Job, Extraction, Media, Database)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download_dir")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Request rejected before any state was touched (bad URL, unknown format, ...)
    #[error("validation error: {0}")]
    Validation(String),

    /// Job lifecycle error
    #[error("job error: {0}")]
    Job(#[from] JobError),

    /// The extraction engine reported a failure
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Media delivery error
    #[error("{0}")]
    Media(#[from] MediaError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Shutdown in progress - not accepting new runs
    #[error("shutdown in progress: not accepting new runs")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// A stored value could not be mapped back onto a domain type
    #[error("corrupt record: {0}")]
    CorruptRecord(String),
}

/// Job lifecycle errors
#[derive(Debug, Error)]
pub enum JobError {
    /// No job with this id exists
    #[error("job {id} not found")]
    NotFound {
        /// The job ID that was not found
        id: i64,
    },

    /// A run for this job is already in flight
    #[error("job {id} already has an active run")]
    AlreadyRunning {
        /// The job ID with the active run
        id: i64,
    },

    /// Cannot perform operation in the job's current state
    #[error("cannot {operation} job {id} in state {current_state}")]
    InvalidState {
        /// The job ID that is in an invalid state for the operation
        id: i64,
        /// The operation that was attempted (e.g., "start", "cancel")
        operation: String,
        /// The current state that prevents the operation
        current_state: String,
    },

    /// The engine reported success but no output file could be located
    #[error("downloaded file for job {id} not found (expected {expected})")]
    OutputMissing {
        /// The job ID whose output is missing
        id: i64,
        /// File name the run expected to find in the download root
        expected: String,
    },

    /// The run task panicked
    #[error("run for job {id} panicked: {message}")]
    Panicked {
        /// The job ID whose run panicked
        id: i64,
        /// Panic payload, when it was a string
        message: String,
    },
}

/// Extraction engine errors
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The engine binary could not be located
    #[error("extraction tool not available: {0}")]
    ToolMissing(String),

    /// The engine ran and reported an error
    #[error("{message}")]
    Engine {
        /// Message reported by the engine
        message: String,
        /// Process exit code, if the process exited normally
        exit_code: Option<i32>,
    },

    /// The engine's metadata output could not be interpreted
    #[error("invalid metadata: {0}")]
    Metadata(String),
}

/// Media delivery errors
///
/// Messages deliberately carry no path information.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The requested path resolves outside the download root
    #[error("access denied")]
    AccessDenied,

    /// The requested path does not name a regular file under the download root
    #[error("file not found")]
    NotFound,
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "job_not_found",
///     "message": "job error: job 123 not found",
///     "details": {
///       "job_id": 123
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
///
/// This trait maps domain errors to appropriate HTTP status codes.
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Error::Config { .. } => 400,
            Error::Validation(_) => 400,

            // 403 Forbidden
            Error::Media(MediaError::AccessDenied) => 403,

            // 404 Not Found
            Error::Media(MediaError::NotFound) => 404,
            Error::Job(JobError::NotFound { .. }) => 404,
            Error::Job(JobError::OutputMissing { .. }) => 404,

            // 409 Conflict
            Error::Job(JobError::AlreadyRunning { .. }) => 409,
            Error::Job(JobError::InvalidState { .. }) => 409,

            // 500 Internal Server Error
            Error::Job(JobError::Panicked { .. }) => 500,
            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - the engine talks to remote hosts
            Error::Extraction(ExtractionError::Engine { .. }) => 502,
            Error::Extraction(ExtractionError::Metadata(_)) => 502,

            // 503 Service Unavailable
            Error::Extraction(ExtractionError::ToolMissing(_)) => 503,
            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::Validation(_) => "validation_error",
            Error::Job(e) => match e {
                JobError::NotFound { .. } => "job_not_found",
                JobError::AlreadyRunning { .. } => "already_running",
                JobError::InvalidState { .. } => "invalid_state",
                JobError::OutputMissing { .. } => "output_missing",
                JobError::Panicked { .. } => "run_panicked",
            },
            Error::Extraction(e) => match e {
                ExtractionError::ToolMissing(_) => "tool_missing",
                ExtractionError::Engine { .. } => "extraction_failed",
                ExtractionError::Metadata(_) => "invalid_metadata",
            },
            Error::Media(e) => match e {
                MediaError::AccessDenied => "access_denied",
                MediaError::NotFound => "file_not_found",
            },
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::ShuttingDown => "shutting_down",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Job(JobError::NotFound { id })
            | Error::Job(JobError::AlreadyRunning { id })
            | Error::Job(JobError::Panicked { id, .. }) => Some(serde_json::json!({
                "job_id": id,
            })),
            Error::Job(JobError::InvalidState {
                id,
                operation,
                current_state,
            }) => Some(serde_json::json!({
                "job_id": id,
                "operation": operation,
                "current_state": current_state,
            })),
            Error::Job(JobError::OutputMissing { id, expected }) => Some(serde_json::json!({
                "job_id": id,
                "expected": expected,
            })),
            Error::Extraction(ExtractionError::Engine {
                exit_code: Some(code),
                ..
            }) => Some(serde_json::json!({
                "exit_code": code,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
