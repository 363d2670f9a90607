//! Testing utilities: scripted sources and consistent artifact pairs.
//!
//! Useful for exercising the validator and pipeline without a network or a
//! browser.

use chrono::{Duration, Utc};
use indexmap::IndexMap;
use serde_json::json;
use uuid::Uuid;

use scout::testing::StaticFetcher;
use scout::types::{PaginationType, ScrapeMethod};

use crate::types::item::{Item, ItemsFile, Price};
use crate::types::metadata::{
    InvestigationNotes, ItemsSummary, MetadataFile, OutputFiles, PaginationInfo, SessionInfo,
};
use crate::validator::actual_completeness;

/// Markup carrying a full Shopify fingerprint.
pub const SHOPIFY_LISTING_HTML: &str = r#"
    <html><head>
    <meta name="generator" content="Shopify">
    <script src="https://cdn.shopify.com/s/files/theme.js"></script>
    </head><body>
    <div class="shopify-section">Shopify.theme = {};</div>
    </body></html>
"#;

/// A complete set of well-formed items.
pub fn sample_items(count: usize) -> Vec<Item> {
    let now = Utc::now();
    (0..count)
        .map(|i| {
            Item::new(
                format!("Item {i}"),
                format!("https://shop.example.com/products/{i}"),
                now,
            )
            .with_id(i.to_string())
            .with_price(Price::new(9.99, "USD"))
            .with_image(format!("https://cdn.example.com/{i}.jpg"))
            .with_description("A fine product")
        })
        .collect()
}

/// A consistent artifact pair: references symmetric, completeness derived
/// from the items themselves, `reported_total` as the source's claim.
pub fn artifact_pair(count: usize, reported_total: u64) -> (ItemsFile, MetadataFile) {
    let start = Utc::now() - Duration::seconds(30);
    let end = Utc::now();
    let items_name = "shop_example_com_items_20250301_120000.json".to_string();
    let metadata_name = "shop_example_com_metadata_20250301_120000.json".to_string();

    let items = ItemsFile::new(metadata_name.clone(), sample_items(count));

    let mut completeness = IndexMap::new();
    for field in ["title", "price", "image_urls", "description"] {
        completeness.insert(field.to_string(), actual_completeness(&items, field));
    }

    let metadata = MetadataFile {
        session: SessionInfo {
            session_id: Uuid::new_v4(),
            source_url: "https://shop.example.com".to_string(),
            source_name: "shop_example_com".to_string(),
            start_time: start,
            end_time: end,
            duration_seconds: 30.0,
            method: ScrapeMethod::Api,
        },
        pagination_info: PaginationInfo {
            pagination_type: PaginationType::ApiPagination,
            total_pages: Some(1),
            items_per_page: None,
        },
        items_summary: ItemsSummary {
            total_items_found: reported_total,
            items_scraped: count as u64,
            items_with_errors: 0,
            quality_pct: 95.0,
        },
        field_completeness: completeness,
        investigation_notes: InvestigationNotes::default(),
        output_files: OutputFiles {
            items_file: items_name,
            metadata_file: metadata_name,
        },
    };

    (items, metadata)
}

/// A fetcher scripting a Shopify-looking storefront: fingerprinted landing
/// page plus a paginated `products.json` reporting `pages * per_page`
/// records.
pub fn shopify_store_fetcher(target: &str, pages: u32, per_page: u32) -> StaticFetcher {
    let mut fetcher = StaticFetcher::new().with_html(target, SHOPIFY_LISTING_HTML);
    let endpoint = "https://shop.example.com/products.json";
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
        fetcher = fetcher.with_json(format!("{endpoint}?page={page}"), &body.to_string());
    }
    // The bare endpoint is what the investigator probes.
    let first = json!({
        "products": [{
            "id": 0,
            "title": "Probe Sample",
            "handle": "probe-sample",
            "price": "9.99",
            "images": ["https://cdn.example.com/0.jpg"]
        }],
        "has_more": true
    });
    fetcher.with_json(endpoint, &first.to_string())
}
