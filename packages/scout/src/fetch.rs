//! Fetcher trait seam for plain HTTP access.
//!
//! Everything that touches the network goes through [`Fetcher`], so the
//! investigator and the API-strategy executor can be driven by a scripted
//! implementation in tests (see [`crate::testing::StaticFetcher`]).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::{FetchError, FetchResult};

/// Desktop Chrome user agent used for all outbound requests.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// A fetched HTTP response, whatever its status.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL that was requested
    pub url: String,

    /// Final URL after redirects
    pub final_url: String,

    /// HTTP status code
    pub status: u16,

    /// Content-Type header if present
    pub content_type: Option<String>,

    /// Response body as text
    pub body: String,

    /// When the response arrived
    pub fetched_at: DateTime<Utc>,
}

impl FetchedPage {
    /// Create a page with minimal fields (primarily for tests).
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            final_url: url.clone(),
            url,
            status,
            content_type: None,
            body: body.into(),
            fetched_at: Utc::now(),
        }
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the final URL (after redirects).
    pub fn with_final_url(mut self, final_url: impl Into<String>) -> Self {
        self.final_url = final_url.into();
        self
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the Content-Type header declares JSON.
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.contains("json"))
            .unwrap_or(false)
    }
}

/// A single bounded GET.
///
/// Implementations must apply their own per-request timeout; callers layer
/// aggregate budgets on top.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a URL and return the response, whatever its status.
    ///
    /// Transport failures (DNS, connect, timeout) are errors; HTTP error
    /// statuses are observations and come back as a page.
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage>;

    /// Implementation name (for logging).
    fn name(&self) -> &str {
        "unknown"
    }
}

/// HTTP fetcher backed by `reqwest`.
pub struct HttpFetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    /// Create a fetcher with a 30 second per-request timeout.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a fetcher with a custom per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to create HTTP client"),
            user_agent: USER_AGENT.to_string(),
        }
    }

    /// Set a custom user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage> {
        let parsed = url::Url::parse(url).map_err(|_| FetchError::InvalidUrl {
            url: url.to_string(),
        })?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(FetchError::DisallowedScheme {
                    scheme: other.to_string(),
                })
            }
        }

        tracing::debug!(url = %url, "fetch starting");

        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    tracing::warn!(url = %url, error = %e, "fetch failed");
                    FetchError::Unreachable {
                        url: url.to_string(),
                        source: Box::new(e),
                    }
                }
            })?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response.text().await.map_err(|e| FetchError::Unreachable {
            url: url.to_string(),
            source: Box::new(e),
        })?;

        tracing::debug!(url = %url, status, bytes = body.len(), "fetch complete");

        Ok(FetchedPage {
            url: url.to_string(),
            final_url,
            status,
            content_type,
            body,
            fetched_at: Utc::now(),
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}
