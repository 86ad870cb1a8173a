//! Error types for audio-dl
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (Download, Transcode, Config, etc.)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use crate::types::TaskId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for audio-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for audio-dl
///
/// Every failure in the pipeline is per-request and recoverable; none of these
/// variants is meant to end the process.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_file_size")
        key: Option<String>,
    },

    /// Malformed request (missing fields, oversized input)
    #[error("{0}")]
    Validation(String),

    /// Input is not a supported media URL
    #[error("Invalid YouTube URL: {0}")]
    InvalidUrl(String),

    /// The extraction tool could not resolve the resource (text is the tool's own)
    #[error("{0}")]
    Extraction(String),

    /// A required executable could not be found
    #[error("required tool '{tool}' is not available")]
    ToolUnavailable {
        /// Executable name (e.g. "yt-dlp", "ffmpeg")
        tool: String,
    },

    /// Download stage failure
    #[error("download failed: {0}")]
    Download(#[from] DownloadError),

    /// Transcode stage failure
    #[error("transcode failed: {0}")]
    Transcode(#[from] TranscodeError),

    /// Progress query for an unregistered task
    #[error("unknown task: {0}")]
    UnknownTask(TaskId),

    /// External tool exceeded its time budget and was killed
    #[error("{tool} timed out after {}s", timeout.as_secs())]
    TimedOut {
        /// Executable name
        tool: String,
        /// The budget that was exceeded
        timeout: Duration,
    },

    /// The run was cancelled (consumer disconnect or shutdown)
    #[error("operation cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Download-related errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The download tool exited unsuccessfully
    #[error("download tool exited with status {}: {stderr}", exit_code.map_or_else(|| "unknown".to_string(), |c| c.to_string()))]
    ToolFailed {
        /// Exit code, if the process exited normally
        exit_code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// The tool succeeded but produced no file
    #[error("output file not found in {}", workspace.display())]
    OutputNotFound {
        /// Workspace that was searched
        workspace: PathBuf,
    },

    /// The downloaded file exceeds the configured ceiling
    #[error(
        "downloaded file size {size} bytes ({:.2} MiB) exceeds the limit of {limit} bytes ({:.2} MiB)",
        *size as f64 / 1_048_576.0,
        *limit as f64 / 1_048_576.0
    )]
    TooLarge {
        /// Measured size in bytes
        size: u64,
        /// Ceiling in bytes
        limit: u64,
    },
}

/// Transcode-related errors
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// The transcode tool exited unsuccessfully
    #[error("transcode tool exited with status {}: {stderr}", exit_code.map_or_else(|| "unknown".to_string(), |c| c.to_string()))]
    ToolFailed {
        /// Exit code, if the process exited normally
        exit_code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// The tool succeeded but the expected output is missing
    #[error("transcoded output not found at {}", path.display())]
    OutputNotFound {
        /// Expected output path
        path: PathBuf,
    },
}

/// API error response format
///
/// Returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "code": "unknown_task",
///   "error": "unknown task: 4f1c",
///   "detail": "Unknown task"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Machine-readable error code (e.g., "invalid_url", "download_failed")
    pub code: String,

    /// Human-readable error message
    pub error: String,

    /// Short description suitable for display
    pub detail: String,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            code: code.into(),
            detail: message.clone(),
            error: message,
        }
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
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - caller input or an unresolvable resource
            Error::Validation(_) => 400,
            Error::InvalidUrl(_) => 400,
            Error::Extraction(_) => 400,

            // 404 Not Found
            Error::UnknownTask(_) => 404,

            // 413 Payload Too Large
            Error::Download(DownloadError::TooLarge { .. }) => 413,

            // 502 Bad Gateway - external tool failures
            Error::Download(_) => 502,
            Error::Transcode(_) => 502,

            // 503 Service Unavailable
            Error::ToolUnavailable { .. } => 503,
            Error::Cancelled => 503,

            // 504 Gateway Timeout
            Error::TimedOut { .. } => 504,

            // 500 Internal Server Error - server-side issues
            Error::Config { .. } => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation(_) => "validation_error",
            Error::InvalidUrl(_) => "invalid_url",
            Error::Extraction(_) => "extraction_failed",
            Error::ToolUnavailable { .. } => "tool_unavailable",
            Error::Download(e) => match e {
                DownloadError::ToolFailed { .. } => "download_failed",
                DownloadError::OutputNotFound { .. } => "output_not_found",
                DownloadError::TooLarge { .. } => "file_too_large",
            },
            Error::Transcode(e) => match e {
                TranscodeError::ToolFailed { .. } => "transcode_failed",
                TranscodeError::OutputNotFound { .. } => "transcode_output_not_found",
            },
            Error::UnknownTask(_) => "unknown_task",
            Error::TimedOut { .. } => "timed_out",
            Error::Cancelled => "cancelled",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let detail = match &error {
            Error::UnknownTask(_) => "Unknown task".to_string(),
            _ => message.clone(),
        };

        ApiError {
            code,
            error: message,
            detail,
        }
    }
}
