//! Behavioral pagination classification.
//!
//! Four independent tests (scroll, load-more click, next-control click,
//! captured-network inspection) each vote for a pagination type with a
//! weight. The highest-scoring type wins; when both infinite scroll and API
//! pagination fire, API pagination wins because it is strictly cheaper to
//! drive. No votes at all means a single page, with high confidence.

use std::time::Duration;

use tracing::{debug, info};
use url::Url;

use crate::browser::BrowserDriver;
use crate::error::{ClassifyError, ClassifyResult};
use crate::types::endpoint::Confidence;
use crate::types::pagination::{
    PaginationSelectors, PaginationStrategy, PaginationType, TerminationCondition,
};

/// Selector vocabulary for item containers, scored by match count.
const ITEM_CONTAINER_SELECTORS: &[&str] = &[
    ".product-item",
    ".product-card",
    ".product",
    ".item",
    ".listing",
    ".result",
    "article",
    "[data-product]",
    "[data-item]",
];

/// Load-more control vocabulary.
const LOAD_MORE_SELECTORS: &[&str] = &[
    "text=/load more/i",
    "text=/show more/i",
    "text=/view more/i",
    ".load-more",
    "#load-more",
    "[data-action='load-more']",
];

/// Next-page control vocabulary.
const NEXT_SELECTORS: &[&str] = &[
    ".pagination a.next",
    "a[rel='next']",
    "a[aria-label*='next']",
    ".pager .next",
];

/// Query parameters that carry a page position.
const PAGE_PARAMS: &[&str] = &["page", "p", "pg", "offset", "start", "cursor", "after"];

/// JSON fields that signal whether more records exist.
const HAS_MORE_FIELDS: &[&str] = &["has_more", "has_next", "next_page", "next", "total_pages"];

/// Default consecutive zero-new-item scrolls before infinite scroll stops.
const SCROLL_STOP_ATTEMPTS: u32 = 3;

/// Tunables for one classification run.
#[derive(Debug, Clone)]
pub struct ClassifyConfig {
    /// Scroll rounds in the infinite-scroll test
    pub scroll_rounds: u32,

    /// Settle delay after each scroll or click
    pub settle: Duration,

    /// Aggregate budget for the whole battery
    pub timeout: Duration,

    /// Minimum matches for a container selector to count
    pub min_container_matches: usize,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            scroll_rounds: 3,
            settle: Duration::from_secs(2),
            timeout: Duration::from_secs(60),
            min_container_matches: 3,
        }
    }
}

/// One behavioral vote.
struct Signal {
    pagination_type: PaginationType,
    weight: f64,
    selector: Option<String>,
    page_param: Option<String>,
    has_more_field: Option<String>,
    items_per_round: Option<u32>,
    last_page: Option<u32>,
}

/// Run the behavioral battery against a target and classify its pagination.
pub async fn classify_pagination<D: BrowserDriver + ?Sized>(
    driver: &mut D,
    target_url: &str,
    config: &ClassifyConfig,
) -> ClassifyResult<PaginationStrategy> {
    let budget_ms = config.timeout.as_millis() as u64;
    match tokio::time::timeout(config.timeout, run_battery(driver, target_url, config)).await {
        Ok(result) => result,
        Err(_) => Err(ClassifyError::Timeout { budget_ms }),
    }
}

async fn run_battery<D: BrowserDriver + ?Sized>(
    driver: &mut D,
    target_url: &str,
    config: &ClassifyConfig,
) -> ClassifyResult<PaginationStrategy> {
    driver.goto(target_url).await?;

    let container = detect_item_container(driver, config).await;
    let baseline = driver.count(&container).await;
    debug!(container = %container, baseline, "item container detected");

    let mut signals: Vec<Signal> = Vec::new();

    // (a) scroll to bottom N times; new containers without a URL change
    // point at infinite scroll.
    let url_before = driver.current_url().await;
    let mut last_count = baseline;
    let mut gained = 0u32;
    let mut rounds_with_gain = 0u32;
    for _ in 0..config.scroll_rounds {
        driver.scroll_to_bottom().await?;
        settle(config).await;
        let count = driver.count(&container).await;
        if count > last_count {
            gained += (count - last_count) as u32;
            rounds_with_gain += 1;
        }
        last_count = count;
    }
    if gained > 0 && driver.current_url().await == url_before {
        debug!(gained, "scroll test fired");
        signals.push(Signal {
            pagination_type: PaginationType::InfiniteScroll,
            weight: 0.6,
            selector: None,
            page_param: None,
            has_more_field: None,
            items_per_round: Some(gained / rounds_with_gain.max(1)),
            last_page: None,
        });
    }

    // (b) a visible load-more control that actually appends items.
    if let Some(selector) = driver.first_visible(LOAD_MORE_SELECTORS).await {
        let before = driver.count(&container).await;
        if driver.click(&selector).await.is_ok() {
            settle(config).await;
            let after = driver.count(&container).await;
            if after > before {
                debug!(selector = %selector, loaded = after - before, "load-more test fired");
                signals.push(Signal {
                    pagination_type: PaginationType::LoadMore,
                    weight: 0.7,
                    selector: Some(selector),
                    page_param: None,
                    has_more_field: None,
                    items_per_round: Some((after - before) as u32),
                    last_page: None,
                });
            }
        }
    }

    // (c) a next control whose click advances a page parameter canonically.
    if let Some(selector) = driver.first_visible(NEXT_SELECTORS).await {
        let last_page = max_numbered_link(driver).await;
        let before_url = driver.current_url().await;
        if driver.click(&selector).await.is_ok() {
            settle(config).await;
            let after_url = driver.current_url().await;
            if let Some(param) = canonical_page_advance(&before_url, &after_url) {
                debug!(selector = %selector, param = %param, "traditional test fired");
                signals.push(Signal {
                    pagination_type: PaginationType::Traditional,
                    weight: 0.7,
                    selector: Some(selector),
                    page_param: Some(param),
                    has_more_field: None,
                    items_per_round: Some(baseline as u32),
                    last_page,
                });
            } else if after_url != before_url {
                // URL moved but not through a recognizable parameter.
                signals.push(Signal {
                    pagination_type: PaginationType::Traditional,
                    weight: 0.4,
                    selector: Some(selector),
                    page_param: None,
                    has_more_field: None,
                    items_per_round: Some(baseline as u32),
                    last_page,
                });
            }
        }
    }

    // (d) captured JSON traffic carrying a page parameter and a has-more
    // style field.
    for request in driver.captured_requests().await {
        let Some(param) = pagination_param(&request.url) else {
            continue;
        };
        if let Some(field) = has_more_field(&request.body) {
            debug!(url = %request.url, param = %param, field = %field, "network test fired");
            signals.push(Signal {
                pagination_type: PaginationType::ApiPagination,
                weight: 0.8,
                selector: None,
                page_param: Some(param),
                has_more_field: Some(field),
                items_per_round: None,
                last_page: None,
            });
            break;
        }
    }

    Ok(select_strategy(signals, container))
}

async fn settle(config: &ClassifyConfig) {
    if !config.settle.is_zero() {
        tokio::time::sleep(config.settle).await;
    }
}

/// Highest-count selector from the vocabulary, `article` as a last resort.
async fn detect_item_container<D: BrowserDriver + ?Sized>(
    driver: &D,
    config: &ClassifyConfig,
) -> String {
    let mut best: Option<(String, usize)> = None;
    for selector in ITEM_CONTAINER_SELECTORS {
        let count = driver.count(selector).await;
        if count >= config.min_container_matches
            && best.as_ref().map_or(true, |(_, c)| count > *c)
        {
            best = Some((selector.to_string(), count));
        }
    }
    best.map(|(selector, _)| selector)
        .unwrap_or_else(|| "article".to_string())
}

async fn max_numbered_link<D: BrowserDriver + ?Sized>(driver: &D) -> Option<u32> {
    driver
        .text_contents(".pagination a, .pager a")
        .await
        .iter()
        .filter_map(|text| text.trim().parse::<u32>().ok())
        .max()
}

/// The page-position parameter in a URL's query, if any.
fn pagination_param(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    for (key, _) in url.query_pairs() {
        if PAGE_PARAMS.contains(&key.as_ref()) {
            return Some(key.into_owned());
        }
    }
    None
}

/// Whether the body carries a has-more style field; returns its name.
fn has_more_field(body: &serde_json::Value) -> Option<String> {
    let map = body.as_object()?;
    HAS_MORE_FIELDS
        .iter()
        .find(|field| map.contains_key(**field))
        .map(|field| field.to_string())
}

/// Whether moving from `before` to `after` advanced a page position
/// canonically; returns the parameter name.
fn canonical_page_advance(before: &str, after: &str) -> Option<String> {
    let before_url = Url::parse(before).ok()?;
    let after_url = Url::parse(after).ok()?;

    for param in PAGE_PARAMS {
        let old = numeric_query_value(&before_url, param);
        let new = numeric_query_value(&after_url, param);
        match (old, new) {
            (Some(old), Some(new)) if new > old => return Some(param.to_string()),
            // First page often carries no parameter at all.
            (None, Some(new)) if new >= 2 => return Some(param.to_string()),
            _ => {}
        }
    }

    // Path-based pagination: /page/2/
    let path_re = regex::Regex::new(r"/page/(\d+)(?:/|$)").unwrap();
    let old = path_re
        .captures(before_url.path())
        .and_then(|c| c[1].parse::<u64>().ok())
        .unwrap_or(1);
    if let Some(new) = path_re
        .captures(after_url.path())
        .and_then(|c| c[1].parse::<u64>().ok())
    {
        if new > old {
            return Some("page".to_string());
        }
    }

    None
}

fn numeric_query_value(url: &Url, param: &str) -> Option<u64> {
    url.query_pairs()
        .find(|(key, _)| key == param)
        .and_then(|(_, value)| value.parse::<u64>().ok())
}

fn select_strategy(mut signals: Vec<Signal>, container: String) -> PaginationStrategy {
    if signals.is_empty() {
        info!("no pagination signals; classifying as single page");
        return PaginationStrategy::single_page(container)
            .with_notes("No pagination controls found; single-page listing.");
    }

    // Tie-break: when scroll and network both fire, the API drives the same
    // records and is strictly cheaper, so the scroll vote is dropped.
    let api_fired = signals
        .iter()
        .any(|s| s.pagination_type == PaginationType::ApiPagination);
    if api_fired {
        signals.retain(|s| s.pagination_type != PaginationType::InfiniteScroll);
    }

    let winner = signals
        .into_iter()
        .max_by(|a, b| {
            a.weight
                .partial_cmp(&b.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| priority(a.pagination_type).cmp(&priority(b.pagination_type)))
        })
        .expect("signals is non-empty");

    let confidence = if winner.weight >= 0.7 {
        Confidence::High
    } else if winner.weight >= 0.4 {
        Confidence::Medium
    } else {
        Confidence::Low
    };

    let termination = match winner.pagination_type {
        PaginationType::None => TerminationCondition::SinglePage,
        PaginationType::InfiniteScroll => TerminationCondition::NoNewItems {
            attempts: SCROLL_STOP_ATTEMPTS,
        },
        PaginationType::LoadMore => TerminationCondition::ControlGone {
            selector: winner.selector.clone().unwrap_or_default(),
        },
        PaginationType::Traditional => TerminationCondition::LastNumberedPage {
            last_page: winner.last_page,
        },
        PaginationType::ApiPagination => TerminationCondition::HasMoreFalse {
            field: winner
                .has_more_field
                .clone()
                .unwrap_or_else(|| "has_more".to_string()),
        },
    };

    let selectors = PaginationSelectors {
        item_container: container,
        next_button: (winner.pagination_type == PaginationType::Traditional)
            .then(|| winner.selector.clone())
            .flatten(),
        load_more_button: (winner.pagination_type == PaginationType::LoadMore)
            .then(|| winner.selector.clone())
            .flatten(),
        page_param: winner.page_param.clone(),
    };

    info!(
        pagination = %winner.pagination_type,
        confidence = %confidence,
        "pagination classified"
    );

    PaginationStrategy {
        pagination_type: winner.pagination_type,
        selectors,
        termination,
        estimated_items_per_page: winner.items_per_round,
        detected_page_count: winner.last_page,
        confidence,
        notes: None,
    }
}

fn priority(pagination_type: PaginationType) -> u8 {
    match pagination_type {
        PaginationType::None => 0,
        PaginationType::InfiniteScroll => 1,
        PaginationType::LoadMore => 2,
        PaginationType::Traditional => 3,
        PaginationType::ApiPagination => 4,
    }
}
