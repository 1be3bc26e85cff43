//! # Error Handling
//!
//! This module defines the HTTP-facing error type and how domain errors
//! (audio, assessment, configuration) are converted into it.
//!
//! ## Key Rust Concepts for Error Handling:
//!
//! ### Enums for Error Types
//! - **Variants**: Each enum variant represents a different kind of error
//! - **Data**: Each variant carries a human-readable message
//! - **Pattern matching**: Use `match` to map each variant to an HTTP status
//!
//! ### Traits for Error Conversion
//! - **From trait**: Automatically converts between error types so `?` just works
//! - **ResponseError trait**: Converts errors to HTTP responses
//! - **Display trait**: Defines how errors are formatted as strings

use crate::assessment::AssessmentError;
use crate::audio::AudioError;
use actix_web::{HttpResponse, ResponseError};  // Web framework error handling
use serde_json::json;                          // For creating JSON error responses
use std::fmt;                                  // For implementing Display trait

/// Custom error types for the application.
///
/// ## Error Categories:
/// - **Internal**: Server-side problems (500 errors)
/// - **BadRequest**: Client sent invalid data (400 errors)
/// - **ConfigError**: Configuration or missing credentials (500 errors)
/// - **ValidationError**: Data validation failed (400 errors)
/// - **RecognitionFailed**: The speech service heard no usable speech (400 errors)
/// - **Upstream**: A vendor service failed or answered nonsense (502 errors)
#[derive(Debug)]
pub enum AppError {
    /// Internal server errors
    Internal(String),

    /// Client sent invalid or malformed data
    BadRequest(String),

    /// Configuration file, environment variable or credential problems
    ConfigError(String),

    /// User input failed validation rules
    ValidationError(String),

    /// Recognition finished without recognized speech
    RecognitionFailed(String),

    /// An upstream service call failed
    Upstream(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::RecognitionFailed(msg) => write!(f, "Speech recognition failed: {}", msg),
            AppError::Upstream(msg) => write!(f, "Upstream service error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// HTTP status, machine-readable type and message for this error.
    fn parts(&self) -> (actix_web::http::StatusCode, &'static str, &str) {
        use actix_web::http::StatusCode;

        match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::ConfigError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error", msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            AppError::RecognitionFailed(msg) => (StatusCode::BAD_REQUEST, "recognition_failed", msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "upstream_error", msg),
        }
    }
}

/// Implementation of ResponseError - converts our errors to HTTP responses.
///
/// ## JSON Response Format:
/// All errors return JSON with a consistent structure:
/// ```json
/// {
///   "error": {
///     "type": "validation_error",
///     "message": "audioData is required",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
impl ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        self.parts().0
    }

    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = self.parts();

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,           // Machine-readable error type
                "message": message,           // Human-readable error message
                "timestamp": chrono::Utc::now().to_rfc3339()  // When the error occurred
            }
        }))
    }
}

/// Automatic conversion from anyhow::Error to AppError.
///
/// When you use `?` with an anyhow::Error, it automatically becomes an AppError::Internal.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// JSON parsing errors are almost always due to the client sending malformed data.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

/// `audioData` that is not valid base64 is a client mistake.
impl From<base64::DecodeError> for AppError {
    fn from(err: base64::DecodeError) -> Self {
        AppError::BadRequest(format!("audioData is not valid base64: {}", err))
    }
}

impl From<AudioError> for AppError {
    fn from(err: AudioError) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

/// Map assessment failures onto HTTP semantics.
///
/// ## Mapping:
/// - Missing credentials → 500 config error (operator problem)
/// - Audio the service rejected → 400
/// - No recognizable speech → 400 recognition_failed
/// - Everything else → 502 upstream error
impl From<AssessmentError> for AppError {
    fn from(err: AssessmentError) -> Self {
        match err {
            AssessmentError::NotConfigured(_) => AppError::ConfigError(err.to_string()),
            AssessmentError::InvalidAudio(_) => AppError::BadRequest(err.to_string()),
            AssessmentError::NotRecognized(_) => AppError::RecognitionFailed(err.to_string()),
            AssessmentError::Http { .. }
            | AssessmentError::Transport(_)
            | AssessmentError::Malformed(_) => AppError::Upstream(err.to_string()),
        }
    }
}

/// Type alias for Results that use our custom error type.
pub type AppResult<T> = Result<T, AppError>;
