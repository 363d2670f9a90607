//! The extraction executor: drives the chosen strategy in a loop governed by
//! the pagination termination condition, accumulating items and producing
//! the artifact pair.
//!
//! State machine: `Idle -> Running -> {Completed, Failed}`. A batch that
//! yields zero new items for longer than the grace window forces early
//! termination even when the primary stop signal never fires. CAPTCHA
//! markers are checked on every fetch and are immediately fatal.

mod api;
mod browser;

use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use scout::browser::BrowserDriver;
use scout::fetch::Fetcher;
use scout::types::{InvestigationReport, PaginationStrategy, ScrapeMethod};

use crate::artifacts::{artifact_names, SessionArtifacts};
use crate::error::{ExtractError, ExtractResult};
use crate::parse::source_slug;
use crate::types::item::{Item, ItemsFile};
use crate::types::metadata::{
    InvestigationNotes, ItemsSummary, MetadataFile, OutputFiles, PaginationInfo, SessionInfo,
};
use crate::validator::actual_completeness;

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Tunables for one executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Pacing between paginated fetches
    pub requests_per_second: u32,

    /// Floor for the zero-new-item grace window (strategies may ask for more)
    pub grace_window: u32,

    /// Hard page ceiling regardless of termination condition
    pub max_pages: Option<u32>,

    /// Budget for one extraction run
    pub timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 2,
            grace_window: 2,
            max_pages: None,
            timeout: Duration::from_secs(300),
        }
    }
}

/// Executor lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Drives either extraction strategy and produces the artifact pair.
pub struct ExtractionExecutor {
    config: ExecutorConfig,
    limiter: Arc<DefaultRateLimiter>,
    state: Mutex<ExecutorState>,
}

impl Default for ExtractionExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionExecutor {
    pub fn new() -> Self {
        Self::with_config(ExecutorConfig::default())
    }

    pub fn with_config(config: ExecutorConfig) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(config.requests_per_second.max(1)).expect("rate is non-zero"),
        );
        Self {
            config,
            limiter: Arc::new(RateLimiter::direct(quota)),
            state: Mutex::new(ExecutorState::Idle),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ExecutorState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, state: ExecutorState) {
        *self.state.lock().unwrap() = state;
    }

    /// Extract by driving the discovered API directly.
    pub async fn extract_api<F: Fetcher + ?Sized>(
        &self,
        fetcher: &F,
        report: &InvestigationReport,
        strategy: &PaginationStrategy,
    ) -> ExtractResult<SessionArtifacts> {
        self.set_state(ExecutorState::Running);
        let budget_ms = self.config.timeout.as_millis() as u64;
        let result = match tokio::time::timeout(
            self.config.timeout,
            self.run_api(fetcher, report, strategy),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ExtractError::Timeout { budget_ms }),
        };
        self.settle_state(&result);
        result
    }

    /// Extract by driving a browser over the rendered page.
    pub async fn extract_browser<D: BrowserDriver + ?Sized>(
        &self,
        driver: &mut D,
        report: &InvestigationReport,
        strategy: &PaginationStrategy,
    ) -> ExtractResult<SessionArtifacts> {
        self.set_state(ExecutorState::Running);
        let budget_ms = self.config.timeout.as_millis() as u64;
        let result = match tokio::time::timeout(
            self.config.timeout,
            self.run_browser(driver, report, strategy),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ExtractError::Timeout { budget_ms }),
        };
        self.settle_state(&result);
        result
    }

    /// API extraction with cancellation support.
    pub async fn extract_api_with_cancel<F: Fetcher + ?Sized>(
        &self,
        fetcher: &F,
        report: &InvestigationReport,
        strategy: &PaginationStrategy,
        cancel: CancellationToken,
    ) -> ExtractResult<SessionArtifacts> {
        tokio::select! {
            result = self.extract_api(fetcher, report, strategy) => result,
            _ = cancel.cancelled() => {
                self.set_state(ExecutorState::Failed);
                Err(ExtractError::Cancelled)
            }
        }
    }

    fn settle_state(&self, result: &ExtractResult<SessionArtifacts>) {
        self.set_state(match result {
            Ok(_) => ExecutorState::Completed,
            Err(_) => ExecutorState::Failed,
        });
    }
}

/// Raw counters accumulated by a strategy driver.
pub(crate) struct RunTally {
    pub items: Vec<Item>,
    pub errors: u64,
    /// The source's own total, when the API reported one
    pub reported_total: Option<u64>,
    pub pages: u32,
}

/// Build the artifact pair from a finished run.
///
/// Field completeness divides non-empty occurrences by total items;
/// `quality_pct` blends weighted completeness (80%) with the record success
/// rate (20%). Both artifact names are fixed here, so the bidirectional
/// references are symmetric by construction.
pub(crate) fn finalize(
    report: &InvestigationReport,
    strategy: &PaginationStrategy,
    method: ScrapeMethod,
    start: DateTime<Utc>,
    tally: RunTally,
) -> SessionArtifacts {
    let end = Utc::now();
    let slug = source_slug(&report.target_url);
    let (items_name, metadata_name) = artifact_names(&slug, start);

    let items_file = ItemsFile::new(metadata_name.clone(), tally.items);

    let mut field_completeness = IndexMap::new();
    for field in ["title", "price", "image_urls", "description"] {
        field_completeness.insert(field.to_string(), actual_completeness(&items_file, field));
    }

    let scraped = items_file.len() as u64;
    let attempted = scraped + tally.errors;
    let success_rate = if attempted == 0 {
        1.0
    } else {
        scraped as f64 / attempted as f64
    };

    // Title and price carry the identification weight; images and
    // description round it out.
    let weighted_completeness = field_completeness.get("title").copied().unwrap_or(0.0) * 0.3
        + field_completeness.get("price").copied().unwrap_or(0.0) * 0.3
        + field_completeness.get("image_urls").copied().unwrap_or(0.0) * 0.2
        + field_completeness.get("description").copied().unwrap_or(0.0) * 0.2;
    let quality_pct = ((weighted_completeness * 0.8 + success_rate * 100.0 * 0.2) * 10.0).round() / 10.0;

    let fallback_reason = (report.recommended_strategy != method).then(|| {
        format!(
            "investigation recommended {} but the session ran {}",
            report.recommended_strategy, method
        )
    });

    debug!(
        items = scraped,
        errors = tally.errors,
        pages = tally.pages,
        quality_pct,
        "artifacts finalized"
    );

    let metadata = MetadataFile {
        session: SessionInfo {
            session_id: Uuid::new_v4(),
            source_url: report.target_url.clone(),
            source_name: slug,
            start_time: start,
            end_time: end,
            duration_seconds: (end - start).num_milliseconds() as f64 / 1000.0,
            method,
        },
        pagination_info: PaginationInfo {
            pagination_type: strategy.pagination_type,
            total_pages: Some(tally.pages),
            items_per_page: strategy.estimated_items_per_page,
        },
        items_summary: ItemsSummary {
            total_items_found: tally.reported_total.unwrap_or(scraped),
            items_scraped: scraped,
            items_with_errors: tally.errors,
            quality_pct,
        },
        field_completeness,
        investigation_notes: InvestigationNotes {
            api_endpoints_found: report.api_endpoints_found(),
            api_used: method == ScrapeMethod::Api,
            fallback_reason,
            platform_detected: report.platform_detected.clone(),
        },
        output_files: OutputFiles {
            items_file: items_name,
            metadata_file: metadata_name,
        },
    };

    SessionArtifacts {
        items: items_file,
        metadata,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use serde_json::json;

    use scout::testing::StaticFetcher;
    use scout::types::{
        Confidence, EndpointCandidate, InvestigationMetadata, InvestigationReport, ProbeOutcome,
        ProbedEndpoint, ScrapeMethod,
    };

    pub const TARGET: &str = "https://shop.example.com/collections/all";
    pub const ENDPOINT: &str = "https://shop.example.com/products.json";

    /// A report whose best endpoint is the scripted products.json.
    pub fn api_report() -> InvestigationReport {
        let mut endpoint = ProbedEndpoint::untested(&EndpointCandidate::new(ENDPOINT));
        endpoint.tested = true;
        endpoint.status_code = Some(200);
        endpoint.outcome = ProbeOutcome::Json;
        endpoint.confidence = Confidence::High;
        endpoint.pagination_detected = true;

        InvestigationReport {
            target_url: TARGET.to_string(),
            timestamp: Utc::now(),
            platform_detected: Some("shopify".to_string()),
            platform_confidence: Confidence::High,
            endpoints: vec![endpoint],
            recommended_strategy: ScrapeMethod::Api,
            confidence_score: 0.9,
            duration_ms: 10,
            metadata: InvestigationMetadata {
                endpoints_probed: 1,
                endpoints_found: 1,
                techniques_used: vec![],
            },
        }
    }

    /// A report for browser-driven extraction of the same target.
    pub fn browser_report() -> InvestigationReport {
        let mut report = api_report();
        report.endpoints.clear();
        report.recommended_strategy = ScrapeMethod::Browser;
        report.confidence_score = 0.2;
        report.metadata.endpoints_found = 0;
        report
    }

    /// A fetcher scripting `pages` of products with `per_page` items each,
    /// carrying `has_next` until the last page.
    pub fn paged_api_fetcher(pages: u32, per_page: u32) -> StaticFetcher {
        let mut fetcher = StaticFetcher::new();
        let mut id = 0u32;
        for page in 1..=pages {
            let products: Vec<serde_json::Value> = (0..per_page)
                .map(|_| {
                    id += 1;
                    json!({
                        "id": id,
                        "title": format!("Product {id}"),
                        "handle": format!("product-{id}"),
                        "variants": [{"price": "19.99"}],
                        "images": [{"src": format!("https://cdn.example.com/{id}.jpg")}],
                        "body_html": "<p>Nice</p>"
                    })
                })
                .collect();
            let body = json!({
                "products": products,
                "total": pages * per_page,
                "has_next": page < pages
            });
            fetcher = fetcher.with_json(format!("{ENDPOINT}?page={page}"), &body.to_string());
        }
        fetcher
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use scout::types::PaginationType;

    #[tokio::test]
    async fn test_state_machine_transitions() {
        let executor = ExtractionExecutor::new();
        assert_eq!(executor.state(), ExecutorState::Idle);

        let fetcher = paged_api_fetcher(2, 5);
        let report = api_report();
        let strategy = PaginationStrategy::api("page", "has_next");

        let artifacts = executor
            .extract_api(&fetcher, &report, &strategy)
            .await
            .unwrap();
        assert_eq!(executor.state(), ExecutorState::Completed);
        assert_eq!(artifacts.items.len(), 10);

        // A report with no endpoints fails and the state shows it.
        let no_api = browser_report();
        let err = executor
            .extract_api(&fetcher, &no_api, &strategy)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::NoApiEndpoint { .. }));
        assert_eq!(executor.state(), ExecutorState::Failed);
    }

    #[tokio::test]
    async fn test_finalized_artifacts_reference_each_other() {
        let executor = ExtractionExecutor::new();
        let fetcher = paged_api_fetcher(3, 4);
        let report = api_report();
        let strategy = PaginationStrategy::api("page", "has_next");

        let artifacts = executor
            .extract_api(&fetcher, &report, &strategy)
            .await
            .unwrap();

        assert_eq!(
            artifacts.items.metadata_file,
            artifacts.metadata.output_files.metadata_file
        );
        assert!(artifacts.items_name().contains("_items_"));
        assert!(artifacts.metadata_name().contains("_metadata_"));
        assert_eq!(artifacts.metadata.items_summary.items_scraped, 12);
        assert_eq!(artifacts.metadata.items_summary.total_items_found, 12);
        assert_eq!(
            artifacts.metadata.pagination_info.pagination_type,
            PaginationType::ApiPagination
        );
        assert_eq!(artifacts.metadata.session.method, ScrapeMethod::Api);
        assert!(artifacts.metadata.investigation_notes.api_used);
        // Completeness of the scripted catalog is full.
        assert_eq!(
            artifacts.metadata.field_completeness.get("title").copied(),
            Some(100.0)
        );
        assert!(artifacts.metadata.items_summary.quality_pct > 90.0);
    }

    #[tokio::test]
    async fn test_cancellation() {
        use std::time::Duration;

        let executor = ExtractionExecutor::new();
        let fetcher = scout::testing::StaticFetcher::new()
            .with_default_delay(Duration::from_secs(30));
        let report = api_report();
        let strategy = PaginationStrategy::api("page", "has_next");

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = executor
            .extract_api_with_cancel(&fetcher, &report, &strategy, cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Cancelled));
        assert_eq!(executor.state(), ExecutorState::Failed);
    }

    #[tokio::test]
    async fn test_run_timeout() {
        use std::time::Duration;

        let executor = ExtractionExecutor::with_config(ExecutorConfig {
            timeout: Duration::from_millis(50),
            ..Default::default()
        });
        let fetcher = scout::testing::StaticFetcher::new()
            .with_default_delay(Duration::from_secs(30));
        let report = api_report();
        let strategy = PaginationStrategy::api("page", "has_next");

        let err = executor
            .extract_api(&fetcher, &report, &strategy)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Timeout { .. }));
    }
}
