//! Integration tests for the full session pipeline:
//! investigate -> classify -> extract -> validate -> advise.

use std::time::Duration;

use serde_json::json;

use harvest::testing::{shopify_store_fetcher, SHOPIFY_LISTING_HTML};
use harvest::{Pipeline, PipelineConfig, RootCause, SessionStatus, Tolerances};
use scout::browser::RawItem;
use scout::classifier::ClassifyConfig;
use scout::testing::{ScriptedBrowser, StaticFetcher};
use scout::types::{PaginationType, ScrapeMethod};

const TARGET: &str = "https://shop.example.com/collections/all";

fn quick_config() -> PipelineConfig {
    PipelineConfig {
        classify: ClassifyConfig {
            settle: Duration::ZERO,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn test_api_session_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = quick_config();
    config.output_dir = Some(dir.path().to_path_buf());
    config.metrics_log = Some(dir.path().join("sessions.jsonl"));

    let pipeline = Pipeline::with_config(shopify_store_fetcher(TARGET, 3, 10), config);
    let outcome = pipeline.run_api(TARGET).await;

    assert_eq!(outcome.status, SessionStatus::Success);
    assert_eq!(outcome.exit_code(), 0);

    // Investigation found the platform and recommended the API.
    let report = outcome.report.as_ref().unwrap();
    assert_eq!(report.platform_detected.as_deref(), Some("shopify"));
    assert_eq!(report.recommended_strategy, ScrapeMethod::Api);
    assert!(report.confidence_score >= 0.7);

    // The dataset and its metadata reference each other exactly.
    let artifacts = outcome.artifacts.as_ref().unwrap();
    assert_eq!(artifacts.items.len(), 30);
    assert_eq!(
        artifacts.items.metadata_file,
        artifacts.metadata.output_files.metadata_file
    );
    assert_eq!(artifacts.metadata.items_summary.total_items_found, 30);

    // All five checks pass and the score is exactly 100.
    let validation = outcome.validation.as_ref().unwrap();
    assert!(validation.passed());
    assert_eq!(validation.quality_score, 100);
    assert!(validation.root_cause.is_none());

    // Artifacts and reports landed on disk under their conventional names.
    let items_path = dir.path().join(artifacts.items_name());
    let metadata_path = dir.path().join(artifacts.metadata_name());
    assert!(items_path.exists());
    assert!(metadata_path.exists());
    assert!(dir.path().join("shop_example_com_investigation.json").exists());
    assert!(dir.path().join("shop_example_com_strategy.json").exists());

    // Reloading the artifact pair re-validates identically.
    let (items, metadata) = harvest::load_artifacts(&items_path, &metadata_path)
        .await
        .unwrap();
    let revalidated = harvest::validate(&items, &metadata, &Tolerances::default());
    assert_eq!(revalidated, *validation);

    // Exactly one session record was appended.
    let log = tokio::fs::read_to_string(dir.path().join("sessions.jsonl"))
        .await
        .unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 1);
    let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(record["status"], "success");
    assert_eq!(record["items_scraped"], 30);
    assert_eq!(record["method"], "api");
}

#[tokio::test]
async fn test_undercounting_source_triggers_one_gated_retry() {
    // The API claims 50 records but only ever serves 40: the count check
    // fails, the advisor retries once with a widened grace window, and the
    // session still ends in validation failure with best-effort artifacts.
    let products: Vec<serde_json::Value> = (0..40)
        .map(|i| {
            json!({
                "id": i,
                "title": format!("Product {i}"),
                "handle": format!("product-{i}"),
                "variants": [{"price": "5.00"}],
                "images": [format!("https://cdn.example.com/{i}.jpg")]
            })
        })
        .collect();
    let body = json!({"products": products, "total": 50, "has_next": false});
    let endpoint = "https://shop.example.com/products.json";

    let fetcher = StaticFetcher::new()
        .with_html(TARGET, SHOPIFY_LISTING_HTML)
        .with_json(endpoint, &body.to_string())
        .with_json(format!("{endpoint}?page=1"), &body.to_string());

    let pipeline = Pipeline::with_config(fetcher, quick_config());
    let outcome = pipeline.run_api(TARGET).await;

    assert_eq!(outcome.status, SessionStatus::ValidationFailed);
    assert_eq!(outcome.exit_code(), 3);

    // The artifacts are still returned: a partially-correct dataset is
    // never discarded because a check failed.
    let artifacts = outcome.artifacts.as_ref().unwrap();
    assert_eq!(artifacts.items.len(), 40);
    assert_eq!(artifacts.metadata.items_summary.total_items_found, 50);

    let validation = outcome.validation.as_ref().unwrap();
    assert!(!validation.passed());
    assert_eq!(
        validation.root_cause.as_ref().unwrap().category,
        RootCause::PaginationTerminatedEarly
    );

    // The advisor asked for exactly one retry.
    let advice = outcome.advice.as_ref().unwrap();
    assert!(advice.retry);
    let strategy = outcome.strategy.as_ref().unwrap();
    assert!(strategy.notes.as_deref().unwrap().contains("widened"));
}

#[tokio::test]
async fn test_browser_session_end_to_end() {
    // A plain page with no API: investigation recommends the browser, the
    // classifier sees scroll-fed growth, and extraction rides the scroll.
    let target = "https://feed.example.com/listings";
    let fetcher = StaticFetcher::new().with_html(
        target,
        "<html><body><div class=\"item\">one of many</div></body></html>",
    );

    let items: Vec<RawItem> = (0..30)
        .map(|i| {
            RawItem::new(format!("Listing {i}"))
                .with_url(format!("/listings/{i}"))
                .with_price_text("$40")
                .with_image(format!("/img/{i}.jpg"))
        })
        .collect();
    let mut browser = ScriptedBrowser::new(target)
        .with_item_selector(".item", &[10, 20, 30, 30, 30, 30, 30])
        .with_items(items);

    let pipeline = Pipeline::with_config(fetcher, quick_config());
    let outcome = pipeline.run(target, &mut browser).await;

    assert_eq!(outcome.status, SessionStatus::Success, "{:?}", outcome.error);
    let strategy = outcome.strategy.as_ref().unwrap();
    assert_eq!(strategy.pagination_type, PaginationType::InfiniteScroll);

    let artifacts = outcome.artifacts.as_ref().unwrap();
    assert_eq!(artifacts.items.len(), 30);
    assert_eq!(artifacts.metadata.session.method, ScrapeMethod::Browser);
    assert!(!artifacts.metadata.investigation_notes.api_used);
    assert_eq!(
        artifacts.items.items[0].url,
        "https://feed.example.com/listings/0"
    );
}

#[tokio::test]
async fn test_unreachable_target_fails_investigation() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = quick_config();
    config.metrics_log = Some(dir.path().join("sessions.jsonl"));

    let target = "https://down.example.com/shop";
    let fetcher = StaticFetcher::new().with_unreachable(target);
    let pipeline = Pipeline::with_config(fetcher, config);

    let outcome = pipeline.run_api(target).await;

    assert_eq!(outcome.status, SessionStatus::InvestigationFailed);
    assert_eq!(outcome.exit_code(), 1);
    assert!(outcome.artifacts.is_none());
    assert!(outcome.error.as_deref().unwrap().contains("unreachable"));

    // Even failed sessions land in the log.
    let log = tokio::fs::read_to_string(dir.path().join("sessions.jsonl"))
        .await
        .unwrap();
    let record: serde_json::Value = serde_json::from_str(log.lines().next().unwrap()).unwrap();
    assert_eq!(record["status"], "investigation_failed");
    assert_eq!(record["items_scraped"], 0);
}

#[tokio::test]
async fn test_forced_api_override_skips_classification() {
    let mut config = quick_config();
    config.forced_method = Some(ScrapeMethod::Api);

    let pipeline = Pipeline::with_config(shopify_store_fetcher(TARGET, 2, 5), config);
    let outcome = pipeline.run_api(TARGET).await;

    assert_eq!(outcome.status, SessionStatus::Success);
    let strategy = outcome.strategy.as_ref().unwrap();
    assert_eq!(strategy.pagination_type, PaginationType::ApiPagination);
    assert!(strategy
        .notes
        .as_deref()
        .unwrap()
        .contains("without behavioral classification"));
}

#[tokio::test]
async fn test_captcha_fails_extraction() {
    let endpoint = "https://shop.example.com/products.json";
    let probe_body = json!({
        "products": [{"id": 1, "title": "T", "handle": "t", "price": "1.00", "images": ["x.jpg"]}],
        "has_more": true
    });
    let fetcher = StaticFetcher::new()
        .with_html(TARGET, SHOPIFY_LISTING_HTML)
        .with_json(endpoint, &probe_body.to_string())
        .with_html(
            format!("{endpoint}?page=1"),
            "<html>Please complete the CAPTCHA</html>",
        );

    let pipeline = Pipeline::with_config(fetcher, quick_config());
    let outcome = pipeline.run_api(TARGET).await;

    assert_eq!(outcome.status, SessionStatus::ExtractionFailed);
    assert_eq!(outcome.exit_code(), 2);
    assert!(outcome.error.as_deref().unwrap().contains("CAPTCHA"));
    // Best-effort context still comes back with the failure.
    assert!(outcome.report.is_some());
    assert!(outcome.strategy.is_some());
}
