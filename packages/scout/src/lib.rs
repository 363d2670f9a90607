//! Source Reconnaissance Library
//!
//! Investigates an unknown web data source and works out the cheapest
//! reliable way to pull structured records from it: is there an API, which
//! platform is this, and what pagination mechanism governs the listing?
//!
//! # Usage
//!
//! ```rust,ignore
//! use scout::{HttpFetcher, Investigator};
//!
//! let investigator = Investigator::new(HttpFetcher::new());
//! let report = investigator.investigate("https://shop.example.com").await?;
//!
//! if report.recommended_strategy == scout::ScrapeMethod::Api {
//!     let endpoint = report.best_api_endpoint().unwrap();
//!     // drive the API directly
//! }
//! ```
//!
//! # Modules
//!
//! - [`fetch`] - The [`Fetcher`] seam and its HTTP implementation
//! - [`platform`] - Known-platform fingerprints and endpoint templates
//! - [`probe`] - Single-endpoint probing and response classification
//! - [`investigator`] - The bounded-concurrency investigation orchestrator
//! - [`classifier`] - Behavioral pagination classification
//! - [`browser`] - The [`BrowserDriver`] seam
//! - [`cache`] - TTL cache for investigation reports
//! - [`testing`] - Scripted mock implementations for tests

pub mod browser;
pub mod cache;
pub mod classifier;
pub mod error;
pub mod fetch;
pub mod investigator;
pub mod platform;
pub mod probe;
pub mod testing;
pub mod types;

// Re-export core types at crate root
pub use browser::{BrowserDriver, CapturedRequest, RawItem};
pub use cache::{normalize_url, ReportCache};
pub use classifier::{classify_pagination, ClassifyConfig};
pub use error::{ClassifyError, DriverError, FetchError, InvestigateError};
pub use fetch::{FetchedPage, Fetcher, HttpFetcher};
pub use investigator::{Investigator, InvestigatorConfig, API_THRESHOLD};
pub use platform::{detect_platforms, Platform, PlatformMatch};
pub use types::{
    Confidence, EndpointCandidate, InvestigationMetadata, InvestigationReport,
    PaginationSelectors, PaginationStrategy, PaginationType, ProbeOutcome, ProbedEndpoint,
    ScrapeMethod, TerminationCondition,
};
