//! Error types for Playpen
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Playpen operations
///
/// This enum encompasses all possible errors that can occur while driving
/// a remote playbook session: configuration loading, backend calls,
/// session lookup, and URL handling.
#[derive(Error, Debug)]
pub enum PlaypenError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport failure talking to the execution backend
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The backend reported a session id as unknown or expired
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The backend answered but flagged the request as failed
    #[error("Backend error: {0}")]
    Backend(String),

    /// A playground URL could not be interpreted
    #[error("Invalid playground URL: {0}")]
    InvalidUrl(String),

    /// The controller was asked to do something its current state forbids
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing errors
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Result type alias for Playpen operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

/// Returns true if `err` wraps a [`PlaypenError::SessionNotFound`]
///
/// The lifecycle controller uses this to tell "the session expired" apart
/// from a plain transport failure when deciding whether to clear the URL
/// binding instead of surfacing an error.
pub fn is_session_not_found(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<PlaypenError>(),
        Some(PlaypenError::SessionNotFound(_))
    )
}
