//! Typed errors for extraction and artifact handling.

use thiserror::Error;

use scout::error::{DriverError, FetchError};

/// Errors that abort an extraction run.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Bot defense detected; immediately fatal, never retried here.
    #[error("CAPTCHA detected at {url}")]
    CaptchaDetected { url: String },

    /// Transport failure mid-run.
    #[error("network error: {0}")]
    Network(#[from] FetchError),

    /// The first fetch came back with an unusable status.
    #[error("HTTP {status} from {url}")]
    BadStatus { url: String, status: u16 },

    /// The first page of an API run did not parse as JSON.
    #[error("malformed response from {url}")]
    MalformedResponse { url: String },

    /// The extraction budget elapsed.
    #[error("extraction timed out after {budget_ms}ms")]
    Timeout { budget_ms: u64 },

    /// Operation was cancelled.
    #[error("extraction cancelled")]
    Cancelled,

    /// API strategy chosen but the report has no probed JSON endpoint.
    #[error("no API endpoint available for {url}")]
    NoApiEndpoint { url: String },

    /// A URL in play failed to parse.
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Browser driver failed mid-run.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),
}

/// Errors reading or writing the JSON artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error on {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type alias for extraction operations.
pub type ExtractResult<T> = std::result::Result<T, ExtractError>;

/// Result type alias for artifact I/O.
pub type ArtifactResult<T> = std::result::Result<T, ArtifactError>;
