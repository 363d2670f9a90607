//! Testing utilities including scripted mock implementations.
//!
//! These are useful for testing code built on the [`Fetcher`] and
//! [`BrowserDriver`] seams without touching the network or a real browser.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::browser::{BrowserDriver, CapturedRequest, RawItem};
use crate::error::{DriverError, FetchError, FetchResult};
use crate::fetch::{FetchedPage, Fetcher};

/// A fetcher that serves scripted responses by exact URL.
///
/// Unknown URLs come back 404, so probe sweeps against it behave like a real
/// host with a handful of live endpoints.
#[derive(Default)]
pub struct StaticFetcher {
    pages: HashMap<String, FetchedPage>,
    unreachable: Vec<String>,
    delays: HashMap<String, Duration>,
    default_delay: Option<Duration>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a fully-specified page.
    pub fn with_page(mut self, url: impl Into<String>, page: FetchedPage) -> Self {
        self.pages.insert(url.into(), page);
        self
    }

    /// Serve an HTML body with a 200 status.
    pub fn with_html(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        let url = url.into();
        let page = FetchedPage::new(&url, 200, html).with_content_type("text/html");
        self.with_page(url, page)
    }

    /// Serve a JSON body with a 200 status.
    pub fn with_json(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        let url = url.into();
        let page = FetchedPage::new(&url, 200, body).with_content_type("application/json");
        self.with_page(url, page)
    }

    /// Make a URL fail with a transport error.
    pub fn with_unreachable(mut self, url: impl Into<String>) -> Self {
        self.unreachable.push(url.into());
        self
    }

    /// Delay responses for one URL.
    pub fn with_delay(mut self, url: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(url.into(), delay);
        self
    }

    /// Delay responses for every URL without a scripted page.
    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    /// URLs fetched so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage> {
        self.calls.lock().unwrap().push(url.to_string());

        let delay = self
            .delays
            .get(url)
            .copied()
            .or(if self.pages.contains_key(url) {
                None
            } else {
                self.default_delay
            });
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.unreachable.iter().any(|u| u == url) {
            return Err(FetchError::Unreachable {
                url: url.to_string(),
                source: "scripted transport failure".into(),
            });
        }

        Ok(self
            .pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| FetchedPage::new(url, 404, "Not Found")))
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// A scripted browser driver.
///
/// The page is modeled as a cursor over a sequence of item counts: every
/// scroll or click advances the cursor, and `count`/`extract_items` read the
/// value at the current position (clamped to the last entry).
#[derive(Default)]
pub struct ScriptedBrowser {
    current_url: String,
    html: String,
    item_selector: String,
    counts: Vec<usize>,
    cursor: usize,
    items: Vec<RawItem>,
    visible: Vec<String>,
    hide_after: HashMap<String, usize>,
    clicks: HashMap<String, usize>,
    navigations: HashMap<String, String>,
    texts: HashMap<String, Vec<String>>,
    captured: Vec<CapturedRequest>,
    goto_delay: Option<Duration>,
}

impl ScriptedBrowser {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            current_url: url.into(),
            ..Default::default()
        }
    }

    /// Which selector matches items, and the count visible at each cursor
    /// position.
    pub fn with_item_selector(mut self, selector: impl Into<String>, counts: &[usize]) -> Self {
        self.item_selector = selector.into();
        self.counts = counts.to_vec();
        self
    }

    /// The full item list; `extract_items` exposes a prefix of it sized by
    /// the current count.
    pub fn with_items(mut self, items: Vec<RawItem>) -> Self {
        self.items = items;
        self
    }

    /// Mark a selector visible (and enabled).
    pub fn with_visible(mut self, selector: impl Into<String>) -> Self {
        self.visible.push(selector.into());
        self
    }

    /// Hide a selector after this many clicks on it.
    pub fn with_hide_after(mut self, selector: impl Into<String>, clicks: usize) -> Self {
        self.hide_after.insert(selector.into(), clicks);
        self
    }

    /// Clicking a selector navigates to a URL.
    pub fn with_navigation(mut self, selector: impl Into<String>, url: impl Into<String>) -> Self {
        let selector = selector.into();
        self.navigations.insert(selector.clone(), url.into());
        if !self.visible.contains(&selector) {
            self.visible.push(selector);
        }
        self
    }

    /// Text contents for a selector.
    pub fn with_texts(mut self, selector: impl Into<String>, texts: &[&str]) -> Self {
        self.texts
            .insert(selector.into(), texts.iter().map(|t| t.to_string()).collect());
        self
    }

    /// A JSON response the page "made" in the background.
    pub fn with_captured_request(mut self, request: CapturedRequest) -> Self {
        self.captured.push(request);
        self
    }

    /// Rendered markup returned by `page_html`.
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = html.into();
        self
    }

    /// Make navigation slow (for timeout tests).
    pub fn with_goto_delay(mut self, delay: Duration) -> Self {
        self.goto_delay = Some(delay);
        self
    }

    fn count_at_cursor(&self) -> usize {
        if self.counts.is_empty() {
            return 0;
        }
        self.counts[self.cursor.min(self.counts.len() - 1)]
    }

    fn is_hidden(&self, selector: &str) -> bool {
        match self.hide_after.get(selector) {
            Some(limit) => self.clicks.get(selector).copied().unwrap_or(0) >= *limit,
            None => false,
        }
    }
}

#[async_trait]
impl BrowserDriver for ScriptedBrowser {
    async fn goto(&mut self, url: &str) -> Result<(), DriverError> {
        if let Some(delay) = self.goto_delay {
            tokio::time::sleep(delay).await;
        }
        self.current_url = url.to_string();
        self.cursor = 0;
        self.clicks.clear();
        Ok(())
    }

    async fn current_url(&self) -> String {
        self.current_url.clone()
    }

    async fn page_html(&self) -> String {
        self.html.clone()
    }

    async fn count(&self, selector: &str) -> usize {
        if selector == self.item_selector {
            self.count_at_cursor()
        } else {
            0
        }
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), DriverError> {
        self.cursor += 1;
        Ok(())
    }

    async fn first_visible(&self, selectors: &[&str]) -> Option<String> {
        selectors
            .iter()
            .find(|s| self.visible.iter().any(|v| v == *s) && !self.is_hidden(s))
            .map(|s| s.to_string())
    }

    async fn is_enabled(&self, selector: &str) -> bool {
        self.visible.iter().any(|v| v == selector) && !self.is_hidden(selector)
    }

    async fn click(&mut self, selector: &str) -> Result<(), DriverError> {
        if !self.visible.iter().any(|v| v == selector) {
            return Err(DriverError::Interaction {
                selector: selector.to_string(),
                reason: "not visible".to_string(),
            });
        }
        *self.clicks.entry(selector.to_string()).or_insert(0) += 1;
        if let Some(url) = self.navigations.get(selector) {
            self.current_url = url.clone();
        }
        self.cursor += 1;
        Ok(())
    }

    async fn text_contents(&self, selector: &str) -> Vec<String> {
        self.texts.get(selector).cloned().unwrap_or_default()
    }

    async fn captured_requests(&self) -> Vec<CapturedRequest> {
        self.captured.clone()
    }

    async fn extract_items(&self, container_selector: &str) -> Vec<RawItem> {
        if container_selector != self.item_selector {
            return Vec::new();
        }
        let visible = self.count_at_cursor().min(self.items.len());
        self.items[..visible].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_fetcher_defaults_to_404() {
        let fetcher = StaticFetcher::new().with_html("https://example.com", "<html></html>");

        let hit = fetcher.fetch("https://example.com").await.unwrap();
        assert_eq!(hit.status, 200);

        let miss = fetcher.fetch("https://example.com/nope").await.unwrap();
        assert_eq!(miss.status, 404);

        assert_eq!(fetcher.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_scripted_browser_cursor() {
        let mut browser = ScriptedBrowser::new("https://example.com")
            .with_item_selector(".item", &[2, 5])
            .with_items(vec![
                RawItem::new("a"),
                RawItem::new("b"),
                RawItem::new("c"),
                RawItem::new("d"),
                RawItem::new("e"),
            ]);

        assert_eq!(browser.count(".item").await, 2);
        assert_eq!(browser.extract_items(".item").await.len(), 2);

        browser.scroll_to_bottom().await.unwrap();
        assert_eq!(browser.count(".item").await, 5);
        assert_eq!(browser.extract_items(".item").await.len(), 5);

        // Cursor clamps at the last scripted count.
        browser.scroll_to_bottom().await.unwrap();
        assert_eq!(browser.count(".item").await, 5);
    }

    #[tokio::test]
    async fn test_hide_after_clicks() {
        let mut browser = ScriptedBrowser::new("https://example.com")
            .with_item_selector(".item", &[2, 4])
            .with_visible(".load-more")
            .with_hide_after(".load-more", 1);

        assert!(browser.is_enabled(".load-more").await);
        browser.click(".load-more").await.unwrap();
        assert!(!browser.is_enabled(".load-more").await);
        assert!(browser.first_visible(&[".load-more"]).await.is_none());
    }
}
