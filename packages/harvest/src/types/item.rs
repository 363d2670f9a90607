//! Scraped items and the items artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Price information for an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    /// Numeric amount
    pub amount: f64,

    /// ISO 4217 currency code
    pub currency: String,

    /// Original price text, when parsed from display markup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_text: Option<String>,
}

impl Price {
    pub fn new(amount: f64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
            display_text: None,
        }
    }

    pub fn with_display_text(mut self, text: impl Into<String>) -> Self {
        self.display_text = Some(text.into());
        self
    }
}

/// One scraped record.
///
/// Append-only within a session; the set is immutable once the session ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Source-assigned identifier, when one exists
    pub id: Option<String>,

    /// Item title (required, non-empty)
    pub title: String,

    pub price: Option<Price>,

    #[serde(default)]
    pub image_urls: Vec<String>,

    /// Item URL
    pub url: String,

    pub description: Option<String>,

    /// When this record was scraped
    pub scraped_at: DateTime<Utc>,
}

impl Item {
    pub fn new(title: impl Into<String>, url: impl Into<String>, scraped_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            title: title.into(),
            price: None,
            image_urls: Vec::new(),
            url: url.into(),
            description: None,
            scraped_at,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_price(mut self, price: Price) -> Self {
        self.price = Some(price);
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

    /// The key used to spot the same record arriving twice across pages.
    pub fn dedupe_key(&self) -> String {
        match &self.id {
            Some(id) => format!("id:{id}"),
            None => format!("url:{}", self.url),
        }
    }

    /// Violations of the declared item shape, if any.
    ///
    /// Schema problems are aggregated, never silently dropped: the caller
    /// reports each offending item with its index.
    pub fn schema_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        if self.title.trim().is_empty() {
            violations.push("title is empty".to_string());
        }
        if self.url.trim().is_empty() {
            violations.push("url is empty".to_string());
        }
        if let Some(price) = &self.price {
            if !price.amount.is_finite() || price.amount < 0.0 {
                violations.push(format!("price amount is not a valid number: {}", price.amount));
            }
            if price.currency.len() != 3 || !price.currency.chars().all(|c| c.is_ascii_alphabetic())
            {
                violations.push(format!("currency is not ISO 4217: {:?}", price.currency));
            }
        }
        if self.image_urls.iter().any(|u| u.trim().is_empty()) {
            violations.push("image_urls contains an empty entry".to_string());
        }

        violations
    }
}

/// The items artifact.
///
/// `metadata_file` must exactly equal the paired metadata artifact's own
/// identity; `items.len()` is the authoritative count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemsFile {
    /// Filename of the paired metadata artifact
    pub metadata_file: String,

    pub items: Vec<Item>,
}

impl ItemsFile {
    pub fn new(metadata_file: impl Into<String>, items: Vec<Item>) -> Self {
        Self {
            metadata_file: metadata_file.into(),
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
