//! The investigator: one page fetch, platform detection, and a bounded
//! concurrent probe pool, all inside a single aggregate budget.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{normalize_url, ReportCache, DEFAULT_TTL};
use crate::error::{FetchError, InvestigateError, InvestigateResult};
use crate::fetch::Fetcher;
use crate::platform::{
    detect_platforms, mine_script_endpoints, PlatformMatch, GENERIC_ENDPOINTS,
};
use crate::probe::{core_field_matches, probe_endpoint};
use crate::types::endpoint::{Confidence, EndpointCandidate, ProbeOutcome, ProbedEndpoint};
use crate::types::report::{InvestigationMetadata, InvestigationReport, ScrapeMethod};

/// Weight caps for the three confidence-score components.
const PLATFORM_WEIGHT: f64 = 0.4;
const ENDPOINT_WEIGHT: f64 = 0.4;
const SAMPLE_WEIGHT: f64 = 0.2;

/// Score at or above which the API strategy is recommended.
pub const API_THRESHOLD: f64 = 0.7;

/// Tunables for an [`Investigator`].
#[derive(Debug, Clone)]
pub struct InvestigatorConfig {
    /// Concurrent probe ceiling (the only shared mutable resource)
    pub probe_concurrency: usize,

    /// Aggregate budget covering the page fetch and every probe
    pub timeout: Duration,

    /// Candidate cap after dedup
    pub max_candidates: usize,

    /// Cap on endpoints mined from inline scripts
    pub max_mined: usize,

    /// Report cache TTL
    pub cache_ttl: Duration,
}

impl Default for InvestigatorConfig {
    fn default() -> Self {
        Self {
            probe_concurrency: 6,
            timeout: Duration::from_secs(30),
            max_candidates: 16,
            max_mined: 8,
            cache_ttl: DEFAULT_TTL,
        }
    }
}

/// Investigates a target URL and recommends an extraction strategy.
///
/// Read-only reconnaissance: network I/O is the only side effect, and the
/// produced report is never mutated afterward.
pub struct Investigator<F: Fetcher + 'static> {
    fetcher: Arc<F>,
    config: InvestigatorConfig,
    cache: ReportCache,
}

impl<F: Fetcher + 'static> Investigator<F> {
    pub fn new(fetcher: F) -> Self {
        Self::with_shared(Arc::new(fetcher), InvestigatorConfig::default())
    }

    pub fn with_config(fetcher: F, config: InvestigatorConfig) -> Self {
        Self::with_shared(Arc::new(fetcher), config)
    }

    /// Build around an already-shared fetcher.
    pub fn with_shared(fetcher: Arc<F>, config: InvestigatorConfig) -> Self {
        let cache = ReportCache::new(config.cache_ttl);
        Self {
            fetcher,
            config,
            cache,
        }
    }

    /// The shared fetcher handle.
    pub fn fetcher(&self) -> Arc<F> {
        Arc::clone(&self.fetcher)
    }

    /// Investigate with the configured timeout.
    pub async fn investigate(&self, target_url: &str) -> InvestigateResult<InvestigationReport> {
        self.investigate_with_timeout(target_url, self.config.timeout)
            .await
    }

    /// Investigate with an explicit aggregate timeout.
    ///
    /// The budget is a hard ceiling: once it elapses, in-flight probes are
    /// cancelled and any candidate that never ran stays `tested = false`.
    pub async fn investigate_with_timeout(
        &self,
        target_url: &str,
        timeout: Duration,
    ) -> InvestigateResult<InvestigationReport> {
        let cache_key = normalize_url(target_url).map_err(|_| InvestigateError::InvalidUrl {
            url: target_url.to_string(),
        })?;

        if let Some(cached) = self.cache.get(&cache_key) {
            debug!(url = %target_url, "investigation cache hit");
            return Ok(cached);
        }

        let started = std::time::Instant::now();
        let started_at = chrono::Utc::now();
        let deadline = tokio::time::Instant::now() + timeout;
        let budget_ms = timeout.as_millis() as u64;

        // Phase 1: fetch the target page once.
        let page = match tokio::time::timeout_at(deadline, self.fetcher.fetch(target_url)).await {
            Err(_) => {
                return Err(InvestigateError::Timeout {
                    url: target_url.to_string(),
                    budget_ms,
                })
            }
            Ok(Err(FetchError::Timeout { .. })) => {
                return Err(InvestigateError::Timeout {
                    url: target_url.to_string(),
                    budget_ms,
                })
            }
            Ok(Err(e)) => {
                return Err(InvestigateError::Unreachable {
                    url: target_url.to_string(),
                    reason: e.to_string(),
                })
            }
            Ok(Ok(page)) => page,
        };

        if page.status >= 400 {
            return Err(InvestigateError::Unreachable {
                url: target_url.to_string(),
                reason: format!("HTTP {}", page.status),
            });
        }

        let base = Url::parse(&page.final_url)
            .or_else(|_| Url::parse(target_url))
            .map_err(|_| InvestigateError::InvalidUrl {
                url: target_url.to_string(),
            })?;

        // Phase 2: platform detection against page signals.
        let platforms = detect_platforms(&page.body);
        if let Some(top) = platforms.first() {
            info!(
                url = %target_url,
                platform = %top.platform,
                strength = top.strength,
                "platform fingerprint matched"
            );
        }

        // Phase 3: expand matches into a candidate set.
        let candidates = self.build_candidates(&base, &platforms, &page.body);

        // Phases 4-5: probe concurrently under the remaining budget.
        let endpoints = self.probe_all(&candidates, deadline).await;

        // Phases 6-7: score and recommend.
        let top = platforms.first();
        let confidence_score = confidence_score(top, &endpoints);
        let recommended_strategy = recommend(confidence_score, &endpoints);
        let endpoints_found = endpoints
            .iter()
            .filter(|e| e.outcome == ProbeOutcome::Json)
            .count();

        let report = InvestigationReport {
            target_url: target_url.to_string(),
            timestamp: started_at,
            platform_detected: top.map(|m| m.platform.to_string()),
            platform_confidence: top.map(|m| m.confidence).unwrap_or(Confidence::Low),
            endpoints,
            recommended_strategy,
            confidence_score,
            duration_ms: started.elapsed().as_millis() as u64,
            metadata: InvestigationMetadata {
                endpoints_probed: candidates.len(),
                endpoints_found,
                techniques_used: vec![
                    "platform_detection".to_string(),
                    "known_endpoints".to_string(),
                    "script_mining".to_string(),
                    "endpoint_probing".to_string(),
                ],
            },
        };

        info!(
            url = %target_url,
            score = report.confidence_score,
            strategy = %report.recommended_strategy,
            endpoints_found,
            duration_ms = report.duration_ms,
            "investigation complete"
        );

        self.cache.insert(cache_key, report.clone());
        Ok(report)
    }

    /// Platform templates first, then mined script endpoints, then the
    /// generic fallbacks; deduped, capped.
    fn build_candidates(
        &self,
        base: &Url,
        platforms: &[PlatformMatch],
        html: &str,
    ) -> Vec<EndpointCandidate> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut candidates: Vec<EndpointCandidate> = Vec::new();

        for platform_match in platforms {
            for template in crate::platform::endpoint_templates(platform_match.platform) {
                if let Ok(url) = base.join(template) {
                    push_candidate(&mut candidates, &mut seen, url.to_string(), Confidence::Medium);
                }
            }
        }

        for mined in mine_script_endpoints(html, base, self.config.max_mined) {
            push_candidate(&mut candidates, &mut seen, mined, Confidence::Medium);
        }

        for path in GENERIC_ENDPOINTS {
            if let Ok(url) = base.join(path) {
                push_candidate(&mut candidates, &mut seen, url.to_string(), Confidence::Low);
            }
        }

        candidates.truncate(self.config.max_candidates);
        candidates
    }

    async fn probe_all(
        &self,
        candidates: &[EndpointCandidate],
        deadline: tokio::time::Instant,
    ) -> Vec<ProbedEndpoint> {
        let semaphore = Arc::new(Semaphore::new(self.config.probe_concurrency));
        let mut set: JoinSet<ProbedEndpoint> = JoinSet::new();

        for candidate in candidates.iter().cloned() {
            let fetcher = Arc::clone(&self.fetcher);
            let semaphore = Arc::clone(&semaphore);
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.unwrap();
                probe_endpoint(fetcher.as_ref(), candidate).await
            });
        }

        let mut results: HashMap<String, ProbedEndpoint> = HashMap::new();
        loop {
            match tokio::time::timeout_at(deadline, set.join_next()).await {
                Ok(Some(Ok(probed))) => {
                    results.insert(probed.url.clone(), probed);
                }
                Ok(Some(Err(e))) => {
                    warn!(error = %e, "probe task failed");
                }
                Ok(None) => break,
                Err(_) => {
                    debug!(
                        pending = candidates.len() - results.len(),
                        "probe budget exhausted, cancelling remaining probes"
                    );
                    set.abort_all();
                    break;
                }
            }
        }

        candidates
            .iter()
            .map(|c| {
                results
                    .remove(&c.url)
                    .unwrap_or_else(|| ProbedEndpoint::untested(c))
            })
            .collect()
    }
}

fn push_candidate(
    candidates: &mut Vec<EndpointCandidate>,
    seen: &mut HashSet<String>,
    url: String,
    confidence: Confidence,
) {
    if seen.insert(url.clone()) {
        candidates.push(EndpointCandidate::new(url).with_confidence(confidence));
    }
}

/// Weighted confidence: platform match (<= 0.4), probed endpoint quality
/// (<= 0.4), and structural completeness of the first sampled body (<= 0.2).
fn confidence_score(top: Option<&PlatformMatch>, endpoints: &[ProbedEndpoint]) -> f64 {
    let platform_part = top.map(|m| m.strength * PLATFORM_WEIGHT).unwrap_or(0.0);

    let json: Vec<&ProbedEndpoint> = endpoints
        .iter()
        .filter(|e| e.outcome == ProbeOutcome::Json)
        .collect();

    let endpoint_part = match json.iter().map(|e| e.confidence).max() {
        None => 0.0,
        Some(best) => {
            let base = match best {
                Confidence::High => 0.3,
                Confidence::Medium => 0.2,
                Confidence::Low => 0.1,
            };
            (base + 0.025 * json.len().saturating_sub(1) as f64).min(ENDPOINT_WEIGHT)
        }
    };

    let sample_part = json
        .iter()
        .find(|e| !e.sample_fields.is_empty())
        .map(|e| {
            let matches = core_field_matches(&e.sample_fields).min(3) as f64;
            (matches / 3.0) * SAMPLE_WEIGHT
        })
        .unwrap_or(0.0);

    (platform_part + endpoint_part + sample_part).min(1.0)
}

fn recommend(score: f64, endpoints: &[ProbedEndpoint]) -> ScrapeMethod {
    if score >= API_THRESHOLD && endpoints.iter().any(|e| e.is_structured()) {
        ScrapeMethod::Api
    } else {
        ScrapeMethod::Browser
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticFetcher;
    use serde_json::json;

    const SHOPIFY_HTML: &str = r#"
        <html><head>
        <meta name="generator" content="Shopify">
        <script src="https://cdn.shopify.com/s/files/theme.js"></script>
        </head><body>
        <div class="shopify-section">Shopify.theme = {};</div>
        </body></html>
    "#;

    fn shopify_fetcher(target: &str) -> StaticFetcher {
        StaticFetcher::new()
            .with_html(target, SHOPIFY_HTML)
            .with_json(
                "https://shop.example.com/products.json",
                &json!({
                    "products": [
                        {"id": 1, "title": "Widget", "price": "9.99", "images": ["a.jpg"]}
                    ],
                    "has_more": true
                })
                .to_string(),
            )
    }

    #[tokio::test]
    async fn test_shopify_listing_recommends_api() {
        let target = "https://shop.example.com/collections/all";
        let investigator = Investigator::new(shopify_fetcher(target));

        let report = investigator.investigate(target).await.unwrap();

        assert_eq!(report.platform_detected.as_deref(), Some("shopify"));
        assert_eq!(report.recommended_strategy, ScrapeMethod::Api);
        assert!(
            report.confidence_score >= 0.7,
            "score was {}",
            report.confidence_score
        );
        let best = report.best_api_endpoint().unwrap();
        assert_eq!(best.url, "https://shop.example.com/products.json");
        assert_eq!(best.confidence, Confidence::High);
    }

    #[tokio::test]
    async fn test_plain_page_recommends_browser() {
        let target = "https://example.com/listings";
        let fetcher =
            StaticFetcher::new().with_html(target, "<html><body><p>nothing here</p></body></html>");
        let investigator = Investigator::new(fetcher);

        let report = investigator.investigate(target).await.unwrap();

        assert_eq!(report.platform_detected, None);
        assert_eq!(report.recommended_strategy, ScrapeMethod::Browser);
        assert!(report.confidence_score < API_THRESHOLD);
        // Generic fallbacks still get probed, and all came back 404.
        assert!(report.endpoints.iter().all(|e| e.tested));
        assert_eq!(report.metadata.endpoints_found, 0);
    }

    #[tokio::test]
    async fn test_unreachable_target_is_fatal() {
        let target = "https://down.example.com";
        let fetcher = StaticFetcher::new().with_unreachable(target);
        let investigator = Investigator::new(fetcher);

        let err = investigator.investigate(target).await.unwrap_err();
        assert!(matches!(err, InvestigateError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn test_budget_is_a_hard_ceiling() {
        let target = "https://slow.example.com/shop";
        // The page itself is fast, but every probe hangs far past the budget.
        let fetcher = StaticFetcher::new()
            .with_html(target, SHOPIFY_HTML)
            .with_default_delay(Duration::from_secs(30));
        let config = InvestigatorConfig {
            timeout: Duration::from_millis(150),
            ..Default::default()
        };
        let investigator = Investigator::with_config(fetcher, config);

        let started = std::time::Instant::now();
        let report = investigator.investigate(target).await.unwrap();
        let elapsed = started.elapsed();

        assert!(
            elapsed < Duration::from_millis(1500),
            "investigation overran its budget: {elapsed:?}"
        );
        // Probes never finished, so every candidate stays untested.
        assert!(report.endpoints.iter().all(|e| !e.tested));
        assert_eq!(report.recommended_strategy, ScrapeMethod::Browser);
    }

    #[tokio::test]
    async fn test_reports_are_cached_by_normalized_url() {
        let target = "https://shop.example.com/collections/all";
        let fetcher = shopify_fetcher(target);
        let investigator = Investigator::new(fetcher);

        let first = investigator.investigate(target).await.unwrap();
        let calls_after_first = {
            let fetcher = investigator.fetcher();
            fetcher.calls().len()
        };

        // Trailing slash normalizes to the same key.
        let second = investigator
            .investigate("https://shop.example.com/collections/all/")
            .await
            .unwrap();

        assert_eq!(first.confidence_score, second.confidence_score);
        assert_eq!(investigator.fetcher().calls().len(), calls_after_first);
    }
}
