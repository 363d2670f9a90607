//! Browser driver seam for behavioral probing and driven-browser extraction.
//!
//! The classifier and the browser-strategy executor never talk to a real
//! browser directly; they drive this trait. Production wires in an
//! automation backend, tests use [`crate::testing::ScriptedBrowser`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DriverError;

/// A JSON response the browser observed while the page was interacted with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedRequest {
    pub url: String,
    pub status: u16,
    pub body: serde_json::Value,
}

/// One item container read off the rendered page, fields untyped.
///
/// Parsing (price text, URL resolution) happens downstream; the driver only
/// reports what the DOM shows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    pub id: Option<String>,
    pub title: Option<String>,
    pub price_text: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub url: Option<String>,
    pub description: Option<String>,
}

impl RawItem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_price_text(mut self, price: impl Into<String>) -> Self {
        self.price_text = Some(price.into());
        self
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_urls.push(url.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Driven-browser operations needed by classification and extraction.
///
/// Selector strings are opaque to this crate; the implementation decides how
/// to interpret them (CSS, text matchers, whatever the backend supports).
#[async_trait]
pub trait BrowserDriver: Send {
    /// Navigate and wait for the page to settle.
    async fn goto(&mut self, url: &str) -> Result<(), DriverError>;

    /// Current page URL (after any client-side navigation).
    async fn current_url(&self) -> String;

    /// Rendered page markup.
    async fn page_html(&self) -> String;

    /// Number of elements matching a selector.
    async fn count(&self, selector: &str) -> usize;

    /// Scroll to the bottom of the page.
    async fn scroll_to_bottom(&mut self) -> Result<(), DriverError>;

    /// First selector from the list that matches a visible element.
    async fn first_visible(&self, selectors: &[&str]) -> Option<String>;

    /// Whether a matched element is enabled (clickable).
    async fn is_enabled(&self, selector: &str) -> bool;

    /// Click the first element matching a selector.
    async fn click(&mut self, selector: &str) -> Result<(), DriverError>;

    /// Text content of every element matching a selector.
    async fn text_contents(&self, selector: &str) -> Vec<String>;

    /// JSON responses captured since the last navigation.
    async fn captured_requests(&self) -> Vec<CapturedRequest>;

    /// Read the item containers matching a selector off the rendered page.
    async fn extract_items(&self, container_selector: &str) -> Vec<RawItem>;
}
