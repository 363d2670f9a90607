//! Browser strategy: drive the rendered page per the classified mechanism.

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, info, warn};
use url::Url;

use scout::browser::BrowserDriver;
use scout::types::{InvestigationReport, PaginationStrategy, PaginationType, ScrapeMethod, TerminationCondition};

use crate::artifacts::SessionArtifacts;
use crate::error::{ExtractError, ExtractResult};
use crate::parse::{detect_captcha, raw_to_item};
use crate::types::item::Item;

use super::{finalize, ExtractionExecutor, RunTally};

impl ExtractionExecutor {
    pub(super) async fn run_browser<D: BrowserDriver + ?Sized>(
        &self,
        driver: &mut D,
        report: &InvestigationReport,
        strategy: &PaginationStrategy,
    ) -> ExtractResult<SessionArtifacts> {
        let start = Utc::now();
        let base = Url::parse(&report.target_url).map_err(|_| ExtractError::InvalidUrl {
            url: report.target_url.clone(),
        })?;

        driver.goto(&report.target_url).await?;
        self.check_captcha(driver, &report.target_url).await?;

        let container = if strategy.selectors.item_container.is_empty() {
            "article".to_string()
        } else {
            strategy.selectors.item_container.clone()
        };
        let grace = strategy
            .termination
            .grace_attempts()
            .max(self.config.grace_window);

        info!(
            container = %container,
            pagination = %strategy.pagination_type,
            "browser extraction starting"
        );

        let mut collector = Collector {
            base,
            seen: HashSet::new(),
            error_keys: HashSet::new(),
            items: Vec::new(),
            errors: 0,
        };

        // The landing page counts as page one.
        collector.collect(driver, &container).await;
        let mut pages = 1u32;
        let mut consecutive_empty = 0u32;

        match strategy.pagination_type {
            PaginationType::None => {}
            PaginationType::InfiniteScroll | PaginationType::ApiPagination => loop {
                if self.page_ceiling_hit(pages) {
                    break;
                }
                self.limiter.until_ready().await;
                driver.scroll_to_bottom().await?;
                self.check_captcha(driver, &report.target_url).await?;
                let new_count = collector.collect(driver, &container).await;
                pages += 1;
                if new_count == 0 {
                    consecutive_empty += 1;
                    if consecutive_empty >= grace {
                        debug!(grace, "no new items after repeated scrolls");
                        break;
                    }
                } else {
                    consecutive_empty = 0;
                }
            },
            PaginationType::LoadMore => {
                let Some(selector) = strategy.selectors.load_more_button.clone() else {
                    warn!("load_more strategy without a control selector; single page only");
                    return Ok(self.finish(report, strategy, start, collector, pages));
                };
                loop {
                    if self.page_ceiling_hit(pages) {
                        break;
                    }
                    if driver.first_visible(&[selector.as_str()]).await.is_none()
                        || !driver.is_enabled(&selector).await
                    {
                        debug!(selector = %selector, "load-more control gone or disabled");
                        break;
                    }
                    self.limiter.until_ready().await;
                    if driver.click(&selector).await.is_err() {
                        break;
                    }
                    self.check_captcha(driver, &report.target_url).await?;
                    let new_count = collector.collect(driver, &container).await;
                    pages += 1;
                    if new_count == 0 {
                        consecutive_empty += 1;
                        if consecutive_empty >= grace {
                            break;
                        }
                    } else {
                        consecutive_empty = 0;
                    }
                }
            }
            PaginationType::Traditional => {
                let Some(selector) = strategy.selectors.next_button.clone() else {
                    warn!("traditional strategy without a next selector; single page only");
                    return Ok(self.finish(report, strategy, start, collector, pages));
                };
                let last_page = match &strategy.termination {
                    TerminationCondition::LastNumberedPage { last_page } => *last_page,
                    _ => None,
                };
                loop {
                    if self.page_ceiling_hit(pages) {
                        break;
                    }
                    if let Some(last) = last_page {
                        if pages >= last {
                            debug!(last, "last numbered page reached");
                            break;
                        }
                    }
                    if driver.first_visible(&[selector.as_str()]).await.is_none()
                        || !driver.is_enabled(&selector).await
                    {
                        debug!(selector = %selector, "next control gone or disabled");
                        break;
                    }
                    self.limiter.until_ready().await;
                    if driver.click(&selector).await.is_err() {
                        break;
                    }
                    self.check_captcha(driver, &report.target_url).await?;
                    let new_count = collector.collect(driver, &container).await;
                    pages += 1;
                    if new_count == 0 {
                        consecutive_empty += 1;
                        if consecutive_empty >= grace {
                            break;
                        }
                    } else {
                        consecutive_empty = 0;
                    }
                }
            }
        }

        Ok(self.finish(report, strategy, start, collector, pages))
    }

    fn page_ceiling_hit(&self, pages: u32) -> bool {
        match self.config.max_pages {
            Some(max) if pages >= max => {
                debug!(max, "max_pages ceiling reached");
                true
            }
            _ => false,
        }
    }

    async fn check_captcha<D: BrowserDriver + ?Sized>(
        &self,
        driver: &D,
        url: &str,
    ) -> ExtractResult<()> {
        if detect_captcha(&driver.page_html().await) {
            return Err(ExtractError::CaptchaDetected {
                url: url.to_string(),
            });
        }
        Ok(())
    }

    fn finish(
        &self,
        report: &InvestigationReport,
        strategy: &PaginationStrategy,
        start: chrono::DateTime<Utc>,
        collector: Collector,
        pages: u32,
    ) -> SessionArtifacts {
        info!(
            items = collector.items.len(),
            pages,
            errors = collector.errors,
            "browser extraction finished"
        );
        finalize(
            report,
            strategy,
            ScrapeMethod::Browser,
            start,
            RunTally {
                items: collector.items,
                errors: collector.errors,
                reported_total: None,
                pages,
            },
        )
    }
}

/// Accumulates items across rounds.
///
/// Rendered pages re-expose earlier records (infinite scroll keeps the whole
/// list in the DOM), so both successes and parse failures are deduped.
struct Collector {
    base: Url,
    seen: HashSet<String>,
    error_keys: HashSet<String>,
    items: Vec<Item>,
    errors: u64,
}

impl Collector {
    async fn collect<D: BrowserDriver + ?Sized>(&mut self, driver: &D, container: &str) -> u32 {
        let mut new_count = 0u32;
        for raw in driver.extract_items(container).await {
            match raw_to_item(&raw, &self.base, Utc::now()) {
                Ok(item) => {
                    let key = match &item.id {
                        Some(id) => format!("id:{id}"),
                        None => format!("{}|{}", item.title, item.url),
                    };
                    if self.seen.insert(key) {
                        self.items.push(item);
                        new_count += 1;
                    }
                }
                Err(reason) => {
                    let key = format!("{raw:?}");
                    if self.error_keys.insert(key) {
                        warn!(%reason, "rendered record dropped");
                        self.errors += 1;
                    }
                }
            }
        }
        new_count
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{browser_report, TARGET};
    use super::super::{ExecutorConfig, ExtractionExecutor};
    use super::*;
    use scout::browser::RawItem;
    use scout::testing::ScriptedBrowser;
    use scout::types::{Confidence, PaginationSelectors};

    fn catalog(count: usize) -> Vec<RawItem> {
        (0..count)
            .map(|i| {
                RawItem::new(format!("Item {i}"))
                    .with_url(format!("/products/item-{i}"))
                    .with_price_text("$12.00")
                    .with_image(format!("/images/{i}.jpg"))
            })
            .collect()
    }

    fn scroll_strategy() -> PaginationStrategy {
        PaginationStrategy {
            pagination_type: PaginationType::InfiniteScroll,
            selectors: PaginationSelectors {
                item_container: ".product".to_string(),
                ..Default::default()
            },
            termination: TerminationCondition::NoNewItems { attempts: 2 },
            estimated_items_per_page: Some(10),
            detected_page_count: None,
            confidence: Confidence::High,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_infinite_scroll_until_no_new_items() {
        // 10 -> 20 -> 30, then the feed dries up.
        let mut browser = ScriptedBrowser::new(TARGET)
            .with_item_selector(".product", &[10, 20, 30, 30, 30])
            .with_items(catalog(30));
        let executor = ExtractionExecutor::new();

        let artifacts = executor
            .extract_browser(&mut browser, &browser_report(), &scroll_strategy())
            .await
            .unwrap();

        assert_eq!(artifacts.items.len(), 30);
        assert_eq!(artifacts.metadata.session.method, ScrapeMethod::Browser);
        assert!(!artifacts.metadata.investigation_notes.api_used);
        assert_eq!(artifacts.metadata.items_summary.total_items_found, 30);
        // Prices parsed off the rendered text.
        assert_eq!(artifacts.items.items[0].price.as_ref().unwrap().amount, 12.0);
        assert_eq!(
            artifacts.items.items[0].url,
            "https://shop.example.com/products/item-0"
        );
    }

    #[tokio::test]
    async fn test_load_more_until_control_disappears() {
        let mut strategy = scroll_strategy();
        strategy.pagination_type = PaginationType::LoadMore;
        strategy.selectors.load_more_button = Some(".load-more".to_string());
        strategy.termination = TerminationCondition::ControlGone {
            selector: ".load-more".to_string(),
        };

        let mut browser = ScriptedBrowser::new(TARGET)
            .with_item_selector(".product", &[10, 20, 30])
            .with_items(catalog(30))
            .with_visible(".load-more")
            .with_hide_after(".load-more", 2);
        let executor = ExtractionExecutor::new();

        let artifacts = executor
            .extract_browser(&mut browser, &browser_report(), &strategy)
            .await
            .unwrap();

        assert_eq!(artifacts.items.len(), 30);
        assert_eq!(artifacts.metadata.pagination_info.total_pages, Some(3));
    }

    #[tokio::test]
    async fn test_single_page_strategy() {
        let mut browser = ScriptedBrowser::new(TARGET)
            .with_item_selector(".product", &[7])
            .with_items(catalog(7));
        let executor = ExtractionExecutor::new();
        let strategy = PaginationStrategy::single_page(".product");

        let artifacts = executor
            .extract_browser(&mut browser, &browser_report(), &strategy)
            .await
            .unwrap();

        assert_eq!(artifacts.items.len(), 7);
        assert_eq!(artifacts.metadata.pagination_info.total_pages, Some(1));
    }

    #[tokio::test]
    async fn test_max_pages_caps_scrolling() {
        let mut browser = ScriptedBrowser::new(TARGET)
            .with_item_selector(".product", &[10, 20, 30, 40, 50])
            .with_items(catalog(50));
        let executor = ExtractionExecutor::with_config(ExecutorConfig {
            max_pages: Some(2),
            ..Default::default()
        });

        let artifacts = executor
            .extract_browser(&mut browser, &browser_report(), &scroll_strategy())
            .await
            .unwrap();

        // Page 1 is the landing view, page 2 the single allowed scroll.
        assert_eq!(artifacts.items.len(), 20);
    }

    #[tokio::test]
    async fn test_captcha_on_landing_page_is_fatal() {
        let mut browser = ScriptedBrowser::new(TARGET)
            .with_item_selector(".product", &[10])
            .with_items(catalog(10))
            .with_html("<html>Are you a robot? Access denied.</html>");
        let executor = ExtractionExecutor::new();

        let err = executor
            .extract_browser(&mut browser, &browser_report(), &scroll_strategy())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::CaptchaDetected { .. }));
    }

    #[tokio::test]
    async fn test_unparseable_records_counted_once() {
        let mut items = catalog(5);
        items.push(RawItem::default()); // no title
        let mut browser = ScriptedBrowser::new(TARGET)
            .with_item_selector(".product", &[6, 6, 6])
            .with_items(items);
        let executor = ExtractionExecutor::new();

        let artifacts = executor
            .extract_browser(&mut browser, &browser_report(), &scroll_strategy())
            .await
            .unwrap();

        assert_eq!(artifacts.items.len(), 5);
        // The broken record re-renders on every round but is counted once.
        assert_eq!(artifacts.metadata.items_summary.items_with_errors, 1);
    }
}
