//! Typed errors for reconnaissance operations.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use thiserror::Error;

/// Errors from a single bounded fetch.
///
/// HTTP error statuses are *not* errors at this layer: a 403 or a 500 is a
/// perfectly good probe observation and comes back as a page. Only
/// transport-level failures land here.
#[derive(Debug, Error)]
pub enum FetchError {
    /// DNS, connect, or TLS failure.
    #[error("unreachable: {url}")]
    Unreachable {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The request exceeded the client's per-request timeout.
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// URL failed to parse.
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// URL scheme not allowed (only http/https are fetched).
    #[error("disallowed URL scheme: {scheme}")]
    DisallowedScheme { scheme: String },
}

/// Errors surfaced by [`Investigator::investigate`](crate::Investigator::investigate).
#[derive(Debug, Error)]
pub enum InvestigateError {
    /// The target page itself could not be fetched.
    #[error("target unreachable: {url}: {reason}")]
    Unreachable { url: String, reason: String },

    /// The aggregate investigation budget elapsed.
    #[error("investigation timed out after {budget_ms}ms: {url}")]
    Timeout { url: String, budget_ms: u64 },

    /// Target URL failed to parse.
    #[error("invalid target URL: {url}")]
    InvalidUrl { url: String },
}

/// Errors surfaced by browser driver implementations.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Navigation to a URL failed or did not settle.
    #[error("navigation failed: {url}: {reason}")]
    Navigation { url: String, reason: String },

    /// An interaction (click, scroll) failed.
    #[error("interaction failed on `{selector}`: {reason}")]
    Interaction { selector: String, reason: String },

    /// The underlying browser session is gone.
    #[error("browser session closed")]
    Closed,
}

/// Errors surfaced by [`classify_pagination`](crate::classify_pagination).
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The classification budget elapsed before the battery finished.
    #[error("pagination classification timed out after {budget_ms}ms")]
    Timeout { budget_ms: u64 },

    /// The browser driver failed mid-battery.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),
}

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for investigation operations.
pub type InvestigateResult<T> = std::result::Result<T, InvestigateError>;

/// Result type alias for classification operations.
pub type ClassifyResult<T> = std::result::Result<T, ClassifyError>;
