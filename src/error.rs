//! Error types for beekit.

use std::time::Duration;

/// Top-level error type for the client runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Platform API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request to {endpoint} failed: {reason}")]
    RequestFailed { endpoint: String, reason: String },

    #[error("Rate limited by the platform, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Authentication failed (check BEEKIT_API_KEY)")]
    AuthFailed,

    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Whether retrying the same request later could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Io(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::RequestFailed { .. } => true,
            Self::AuthFailed
            | Self::NotFound { .. }
            | Self::InvalidResponse { .. }
            | Self::Json(_) => false,
        }
    }
}

/// Upload pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The file failed client-side validation; no request was issued.
    /// `subject` is the short headline, `body` the inline explanation.
    #[error("{subject}: {body}")]
    Rejected { subject: String, body: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sandboxed app bridge errors.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Message origin {got} does not match expected sandbox origin {expected}")]
    OriginMismatch { expected: String, got: String },

    #[error("No sandbox transport attached")]
    Detached,

    #[error("Transport failed: {reason}")]
    Transport { reason: String },

    #[error("Bridge service {service} failed: {reason}")]
    Service { service: String, reason: String },

    #[error("Invalid request payload for {request_type}: {reason}")]
    InvalidPayload {
        request_type: String,
        reason: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
