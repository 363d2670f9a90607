//! Pagination strategy types.
//!
//! A [`PaginationStrategy`] is derived once by behavioral probing and then
//! consumed by the extraction executor; it never changes after classification
//! (the repair advisor builds a fresh one when it wants adjustments).

use serde::{Deserialize, Serialize};

use super::endpoint::Confidence;

/// The mechanism by which additional records become available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationType {
    /// Single page, nothing to paginate
    None,
    /// New items appear on scroll without a URL change
    InfiniteScroll,
    /// A clickable control appends items in place
    LoadMore,
    /// Numbered pages / next control changing a URL parameter
    Traditional,
    /// Background JSON requests carry a page/offset/cursor parameter
    ApiPagination,
}

impl PaginationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaginationType::None => "none",
            PaginationType::InfiniteScroll => "infinite_scroll",
            PaginationType::LoadMore => "load_more",
            PaginationType::Traditional => "traditional",
            PaginationType::ApiPagination => "api_pagination",
        }
    }
}

impl std::fmt::Display for PaginationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selectors the executor needs to drive the classified mechanism.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationSelectors {
    /// Selector matching one item container
    pub item_container: String,

    /// Next-page control, for traditional pagination
    pub next_button: Option<String>,

    /// Load-more control
    pub load_more_button: Option<String>,

    /// Query parameter carrying the page number, for URL/API pagination
    pub page_param: Option<String>,
}

/// When the extraction loop should stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminationCondition {
    /// One page, one pass
    SinglePage,

    /// Stop after this many consecutive rounds with zero new items
    NoNewItems { attempts: u32 },

    /// Stop when the control is absent or disabled
    ControlGone { selector: String },

    /// Stop at the last numbered page or when the next control disappears
    LastNumberedPage { last_page: Option<u32> },

    /// Stop when the response's has-more indicator is false
    HasMoreFalse { field: String },
}

impl TerminationCondition {
    /// The zero-new-item grace window this condition implies.
    ///
    /// Every strategy gets one, even when its primary stop signal is
    /// something else: a missed signal must not loop forever.
    pub fn grace_attempts(&self) -> u32 {
        match self {
            TerminationCondition::NoNewItems { attempts } => *attempts,
            _ => 2,
        }
    }
}

/// The classified pagination mechanism plus everything needed to drive it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationStrategy {
    #[serde(rename = "type")]
    pub pagination_type: PaginationType,

    pub selectors: PaginationSelectors,

    pub termination: TerminationCondition,

    /// Items observed to load per page/scroll, when measurable
    pub estimated_items_per_page: Option<u32>,

    /// Highest numbered page link seen, for traditional pagination
    pub detected_page_count: Option<u32>,

    pub confidence: Confidence,

    /// Free-text classifier notes
    pub notes: Option<String>,
}

impl PaginationStrategy {
    /// Single-page strategy for a known item container.
    pub fn single_page(item_container: impl Into<String>) -> Self {
        Self {
            pagination_type: PaginationType::None,
            selectors: PaginationSelectors {
                item_container: item_container.into(),
                ..Default::default()
            },
            termination: TerminationCondition::SinglePage,
            estimated_items_per_page: None,
            detected_page_count: None,
            confidence: Confidence::High,
            notes: None,
        }
    }

    /// API pagination driven by a numeric page parameter.
    pub fn api(page_param: impl Into<String>, has_more_field: impl Into<String>) -> Self {
        Self {
            pagination_type: PaginationType::ApiPagination,
            selectors: PaginationSelectors {
                item_container: "article".to_string(),
                page_param: Some(page_param.into()),
                ..Default::default()
            },
            termination: TerminationCondition::HasMoreFalse {
                field: has_more_field.into(),
            },
            estimated_items_per_page: None,
            detected_page_count: None,
            confidence: Confidence::Medium,
            notes: None,
        }
    }

    /// Attach classifier notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Serialize for external inspection.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grace_attempts() {
        assert_eq!(
            TerminationCondition::NoNewItems { attempts: 5 }.grace_attempts(),
            5
        );
        assert_eq!(TerminationCondition::SinglePage.grace_attempts(), 2);
        assert_eq!(
            TerminationCondition::HasMoreFalse {
                field: "has_next".to_string()
            }
            .grace_attempts(),
            2
        );
    }

    #[test]
    fn test_strategy_serialization_uses_type_tag() {
        let strategy = PaginationStrategy::api("page", "has_next");
        let json = serde_json::to_value(&strategy).unwrap();

        assert_eq!(json["type"], "api_pagination");
        assert_eq!(json["termination"]["kind"], "has_more_false");
        assert_eq!(json["selectors"]["page_param"], "page");
    }
}
