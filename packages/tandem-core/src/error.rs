//! Centralized error types for the Tandem core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::content::ContentError;
use crate::playback::MediaError;
use crate::session::ReplayError;
use crate::sync::StoreError;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

impl ErrorCode for StoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::HttpStatus(_, _) => "http_error_status",
            Self::NotFound(_) => "session_not_found",
            Self::WrongHost => "wrong_host",
            Self::SessionExists(_) => "session_exists",
            Self::Locked(_) => "session_locked",
            Self::Decode(_) => "decode_error",
        }
    }
}

impl ErrorCode for ContentError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::HttpStatus(_, _) => "http_error_status",
            Self::Decode(_) => "decode_error",
            Self::Unavailable(_) => "content_unavailable",
        }
    }
}

impl ErrorCode for ReplayError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "replay_io_error",
            Self::Json(_) => "replay_corrupt",
            Self::NotFound => "replay_not_found",
            Self::SessionMismatch { .. } => "replay_session_mismatch",
            Self::NoDataDir => "data_dir_not_configured",
        }
    }
}

/// Application-wide error type for Tandem.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum TandemError {
    /// Session id unknown to the store (never created, or ended).
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Joining a session failed.
    #[error("Join failed: {0}")]
    JoinFailed(String),

    /// Host credential rejected.
    #[error("Not authorized as host")]
    WrongHost,

    /// Operation needs write authority this participant does not hold.
    #[error("Operation requires host role: {0}")]
    NotHost(String),

    /// A session with this id already exists.
    #[error("Session already exists: {0}")]
    SessionExists(String),

    /// Session is locked against guest edits.
    #[error("Session is locked: {0}")]
    SessionLocked(String),

    /// Client sent an invalid or malformed request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Store or content service unreachable.
    #[error("Network error: {0}")]
    Network(String),

    /// Local playback failed.
    #[error("Playback error: {0}")]
    Playback(String),

    /// Replay snapshot could not be saved or loaded.
    #[error("Replay error: {0}")]
    Replay(String),

    /// Data directory not configured (required for replay).
    #[error("Data directory not configured: {0}")]
    DataDirNotConfigured(String),

    /// The session task has exited.
    #[error("Session closed")]
    SessionClosed,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TandemError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => "session_not_found",
            Self::JoinFailed(_) => "join_failed",
            Self::WrongHost => "wrong_host",
            Self::NotHost(_) => "not_host",
            Self::SessionExists(_) => "session_exists",
            Self::SessionLocked(_) => "session_locked",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Network(_) => "network_error",
            Self::Playback(_) => "playback_error",
            Self::Replay(_) => "replay_error",
            Self::DataDirNotConfigured(_) => "data_dir_not_configured",
            Self::SessionClosed => "session_closed",
            Self::Configuration(_) => "configuration_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::WrongHost | Self::NotHost(_) => StatusCode::FORBIDDEN,
            Self::SessionExists(_) => StatusCode::CONFLICT,
            Self::SessionLocked(_) => StatusCode::LOCKED,
            Self::InvalidRequest(_) | Self::JoinFailed(_) => StatusCode::BAD_REQUEST,
            Self::Network(_) => StatusCode::BAD_GATEWAY,
            Self::Configuration(_) | Self::DataDirNotConfigured(_) | Self::SessionClosed => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Result Type Aliases
// ─────────────────────────────────────────────────────────────────────────────

// Re-export Result type aliases from their defining modules
pub use crate::content::ContentResult;
pub use crate::playback::MediaResult;
pub use crate::sync::StoreResult;

/// Convenient Result alias for application-wide operations.
pub type TandemResult<T> = Result<T, TandemError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for TandemError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for TandemError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::SessionNotFound(id),
            StoreError::WrongHost => Self::WrongHost,
            StoreError::SessionExists(id) => Self::SessionExists(id),
            StoreError::Locked(id) => Self::SessionLocked(id),
            other => Self::Network(other.to_string()),
        }
    }
}

impl From<ContentError> for TandemError {
    fn from(err: ContentError) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<MediaError> for TandemError {
    fn from(err: MediaError) -> Self {
        Self::Playback(err.to_string())
    }
}

impl From<ReplayError> for TandemError {
    fn from(err: ReplayError) -> Self {
        match err {
            ReplayError::NoDataDir => {
                Self::DataDirNotConfigured("replay requires data_dir".to_string())
            }
            other => Self::Replay(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_http_semantics() {
        let err = TandemError::from(StoreError::NotFound("S".into()));
        assert_eq!(err.code(), "session_not_found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = TandemError::from(StoreError::WrongHost);
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let err = TandemError::from(StoreError::Locked("S".into()));
        assert_eq!(err.status_code(), StatusCode::LOCKED);
    }

    #[test]
    fn transport_errors_become_network_errors() {
        let err = TandemError::from(StoreError::HttpStatus(500, "boom".into()));
        assert_eq!(err.code(), "network_error");
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn missing_data_dir_returns_correct_code() {
        let err = TandemError::from(ReplayError::NoDataDir);
        assert_eq!(err.code(), "data_dir_not_configured");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn error_codes_are_stable_per_layer() {
        assert_eq!(StoreError::WrongHost.code(), "wrong_host");
        assert_eq!(ContentError::Unavailable("x".into()).code(), "content_unavailable");
        assert_eq!(ReplayError::NotFound.code(), "replay_not_found");
    }
}
