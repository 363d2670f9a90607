//! Single-endpoint probing and response classification.

use serde_json::Value;
use tracing::debug;

use crate::fetch::{FetchedPage, Fetcher};
use crate::types::endpoint::{Confidence, EndpointCandidate, ProbeOutcome, ProbedEndpoint};

/// Keys whose presence in a JSON body indicates server-side pagination.
pub const PAGINATION_KEYS: &[&str] = &["next", "page", "total_pages", "has_more", "offset", "limit"];

/// Field names expected of a structured listing record.
const CORE_FIELDS: &[&str] = &["title", "name", "price", "image", "images"];

/// Maximum sampled field names carried on a probe result.
const SAMPLE_FIELD_CAP: usize = 10;

/// Probe one candidate and annotate it with the outcome.
///
/// Probe failures are observations, never errors: a candidate that cannot be
/// reached is recorded as tested with an `Error` outcome.
pub async fn probe_endpoint<F: Fetcher + ?Sized>(
    fetcher: &F,
    candidate: EndpointCandidate,
) -> ProbedEndpoint {
    match fetcher.fetch(&candidate.url).await {
        Ok(page) => classify_response(&candidate, &page),
        Err(e) => {
            debug!(url = %candidate.url, error = %e, "probe failed");
            let mut probed = ProbedEndpoint::untested(&candidate);
            probed.tested = true;
            probed.outcome = ProbeOutcome::Error;
            probed.confidence = Confidence::Low;
            probed
        }
    }
}

/// Classify a probe response: reachable, JSON-shaped, auth-required, or error.
pub fn classify_response(candidate: &EndpointCandidate, page: &FetchedPage) -> ProbedEndpoint {
    let mut probed = ProbedEndpoint::untested(candidate);
    probed.tested = true;
    probed.status_code = Some(page.status);

    if page.status == 401 || page.status == 403 {
        probed.outcome = ProbeOutcome::AuthRequired;
        probed.confidence = Confidence::Low;
        return probed;
    }

    if !page.is_success() {
        probed.outcome = ProbeOutcome::Error;
        probed.confidence = Confidence::Low;
        return probed;
    }

    let body: Value = match serde_json::from_str(&page.body) {
        Ok(value) if page.is_json() || matches!(value, Value::Object(_) | Value::Array(_)) => value,
        _ => {
            probed.outcome = ProbeOutcome::Html;
            probed.confidence = Confidence::Low;
            return probed;
        }
    };

    probed.outcome = ProbeOutcome::Json;
    probed.sample_fields = sample_fields(&body);
    probed.pagination_detected = pagination_detected(&body);
    probed.confidence = match core_field_matches(&probed.sample_fields) {
        n if n >= 3 => Confidence::High,
        2 => Confidence::Medium,
        _ => Confidence::Low,
    };

    debug!(
        url = %probed.url,
        confidence = %probed.confidence,
        fields = probed.sample_fields.len(),
        pagination = probed.pagination_detected,
        "probe classified as JSON"
    );

    probed
}

/// Field names of the first record in the body (first 10).
///
/// Looks for an items array under `products`/`items`/`data`, then falls back
/// to top-level object keys.
pub fn sample_fields(body: &Value) -> Vec<String> {
    let record = match body {
        Value::Object(map) => ["products", "items", "data"]
            .iter()
            .find_map(|key| map.get(*key).and_then(|v| v.as_array()))
            .and_then(|items| items.first()),
        Value::Array(items) => items.first(),
        _ => None,
    };

    let keys: Vec<String> = match record {
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        _ => match body {
            Value::Object(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        },
    };

    keys.into_iter().take(SAMPLE_FIELD_CAP).collect()
}

/// Whether any pagination indicator key appears at the top level.
pub fn pagination_detected(body: &Value) -> bool {
    match body {
        Value::Object(map) => PAGINATION_KEYS.iter().any(|key| map.contains_key(*key)),
        _ => false,
    }
}

/// Number of distinct core listing fields present in a field sample.
pub fn core_field_matches(fields: &[String]) -> usize {
    CORE_FIELDS
        .iter()
        .filter(|core| fields.iter().any(|f| f.eq_ignore_ascii_case(core)))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn json_page(url: &str, body: Value) -> FetchedPage {
        FetchedPage::new(url, 200, body.to_string()).with_content_type("application/json")
    }

    #[test]
    fn test_classifies_product_listing_as_high() {
        let candidate = EndpointCandidate::new("https://shop.example.com/products.json");
        let page = json_page(
            &candidate.url,
            json!({
                "products": [
                    {"id": 1, "title": "Widget", "price": "9.99", "images": ["a.jpg"]}
                ],
                "has_more": true
            }),
        );

        let probed = classify_response(&candidate, &page);

        assert_eq!(probed.outcome, ProbeOutcome::Json);
        assert_eq!(probed.confidence, Confidence::High);
        assert!(probed.pagination_detected);
        assert!(probed.sample_fields.contains(&"title".to_string()));
        assert!(probed.is_structured());
    }

    #[test]
    fn test_auth_required() {
        let candidate = EndpointCandidate::new("https://example.com/api/products");
        let page = FetchedPage::new(&candidate.url, 403, "Forbidden");

        let probed = classify_response(&candidate, &page);
        assert_eq!(probed.outcome, ProbeOutcome::AuthRequired);
        assert_eq!(probed.status_code, Some(403));
    }

    #[test]
    fn test_html_body_is_not_structured() {
        let candidate = EndpointCandidate::new("https://example.com/products");
        let page = FetchedPage::new(&candidate.url, 200, "<html><body>hi</body></html>")
            .with_content_type("text/html");

        let probed = classify_response(&candidate, &page);
        assert_eq!(probed.outcome, ProbeOutcome::Html);
        assert!(!probed.is_structured());
    }

    #[test]
    fn test_sample_fields_top_level_fallback() {
        let body = json!({"name": "thing", "price": 4});
        let fields = sample_fields(&body);
        assert!(fields.contains(&"name".to_string()));
        assert!(fields.contains(&"price".to_string()));
    }

    #[test]
    fn test_core_field_matches_case_insensitive() {
        let fields = vec!["Title".to_string(), "PRICE".to_string(), "sku".to_string()];
        assert_eq!(core_field_matches(&fields), 2);
    }

    #[tokio::test]
    async fn test_probe_transport_failure_is_recorded() {
        use crate::testing::StaticFetcher;

        let fetcher = StaticFetcher::new().with_unreachable("https://down.example.com/api");
        let candidate = EndpointCandidate::new("https://down.example.com/api");

        let probed = probe_endpoint(&fetcher, candidate).await;
        assert!(probed.tested);
        assert_eq!(probed.outcome, ProbeOutcome::Error);
        assert_eq!(probed.status_code, None);
    }
}
