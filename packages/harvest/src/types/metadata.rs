//! The metadata artifact: the session's own account of what it scraped.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use scout::types::{PaginationType, ScrapeMethod};

/// Session bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub source_url: String,
    pub source_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: f64,
    pub method: ScrapeMethod,
}

/// How pagination actually played out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationInfo {
    #[serde(rename = "type")]
    pub pagination_type: PaginationType,
    pub total_pages: Option<u32>,
    pub items_per_page: Option<u32>,
}

/// Counters summarizing the scraped set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemsSummary {
    /// The source's own record count when it reported one, otherwise ours
    pub total_items_found: u64,

    pub items_scraped: u64,

    pub items_with_errors: u64,

    /// Weighted blend of field completeness and error rate, 0 to 100
    pub quality_pct: f64,
}

/// What the investigation phase knew, carried along for the record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvestigationNotes {
    #[serde(default)]
    pub api_endpoints_found: Vec<String>,

    pub api_used: bool,

    pub fallback_reason: Option<String>,

    pub platform_detected: Option<String>,
}

/// Artifact filename pair; must mirror the items artifact exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFiles {
    pub items_file: String,
    pub metadata_file: String,
}

/// The metadata artifact.
///
/// Invariant: `output_files.items_file` references the paired [`ItemsFile`]
/// exactly, and that file's `metadata_file` points back here (bidirectional
/// reference symmetry).
///
/// [`ItemsFile`]: super::item::ItemsFile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataFile {
    pub session: SessionInfo,

    pub pagination_info: PaginationInfo,

    pub items_summary: ItemsSummary,

    /// Per-field completeness percentages, insertion-ordered
    pub field_completeness: IndexMap<String, f64>,

    pub investigation_notes: InvestigationNotes,

    pub output_files: OutputFiles,
}

impl MetadataFile {
    /// This artifact's own identity (its filename).
    pub fn identity(&self) -> &str {
        &self.output_files.metadata_file
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_round_trips_with_field_order() {
        let mut completeness = IndexMap::new();
        completeness.insert("title".to_string(), 100.0);
        completeness.insert("price".to_string(), 92.5);
        completeness.insert("image_urls".to_string(), 88.0);
        completeness.insert("description".to_string(), 40.0);

        let now = Utc::now();
        let metadata = MetadataFile {
            session: SessionInfo {
                session_id: Uuid::new_v4(),
                source_url: "https://shop.example.com".to_string(),
                source_name: "shop_example_com".to_string(),
                start_time: now,
                end_time: now,
                duration_seconds: 1.5,
                method: ScrapeMethod::Api,
            },
            pagination_info: PaginationInfo {
                pagination_type: PaginationType::ApiPagination,
                total_pages: Some(4),
                items_per_page: Some(25),
            },
            items_summary: ItemsSummary {
                total_items_found: 100,
                items_scraped: 100,
                items_with_errors: 0,
                quality_pct: 96.0,
            },
            field_completeness: completeness,
            investigation_notes: InvestigationNotes::default(),
            output_files: OutputFiles {
                items_file: "shop_example_com_items_20250301_120000.json".to_string(),
                metadata_file: "shop_example_com_metadata_20250301_120000.json".to_string(),
            },
        };

        let json = serde_json::to_string_pretty(&metadata).unwrap();
        let back: MetadataFile = serde_json::from_str(&json).unwrap();

        assert_eq!(back.identity(), metadata.identity());
        let keys: Vec<&String> = back.field_completeness.keys().collect();
        assert_eq!(keys, ["title", "price", "image_urls", "description"]);
        assert_eq!(json.matches("\"type\": \"api_pagination\"").count(), 1);
    }
}
