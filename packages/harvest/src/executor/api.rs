//! API strategy: drive the discovered JSON endpoint page by page.

use std::collections::HashSet;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use scout::fetch::Fetcher;
use scout::types::{InvestigationReport, PaginationStrategy, ScrapeMethod};

use crate::artifacts::SessionArtifacts;
use crate::error::{ExtractError, ExtractResult};
use crate::parse::{detect_captcha, record_to_item};
use crate::types::item::Item;

use super::{finalize, ExtractionExecutor, RunTally};

impl ExtractionExecutor {
    pub(super) async fn run_api<F: Fetcher + ?Sized>(
        &self,
        fetcher: &F,
        report: &InvestigationReport,
        strategy: &PaginationStrategy,
    ) -> ExtractResult<SessionArtifacts> {
        let start = Utc::now();

        let endpoint = report
            .best_api_endpoint()
            .ok_or_else(|| ExtractError::NoApiEndpoint {
                url: report.target_url.clone(),
            })?
            .url
            .clone();
        let page_param = strategy
            .selectors
            .page_param
            .clone()
            .unwrap_or_else(|| "page".to_string());
        let base = Url::parse(&report.target_url).map_err(|_| ExtractError::InvalidUrl {
            url: report.target_url.clone(),
        })?;
        let grace = strategy
            .termination
            .grace_attempts()
            .max(self.config.grace_window);

        info!(endpoint = %endpoint, page_param = %page_param, "API extraction starting");

        let mut items: Vec<Item> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut errors = 0u64;
        let mut reported_total: Option<u64> = None;
        let mut pages = 0u32;
        let mut consecutive_empty = 0u32;

        loop {
            if let Some(max) = self.config.max_pages {
                if pages >= max {
                    debug!(max, "max_pages ceiling reached");
                    break;
                }
            }
            let page_no = pages + 1;

            // Pacing delay between paginated fetches, never before the first.
            if pages > 0 {
                self.limiter.until_ready().await;
            }

            let url = page_url(&endpoint, &page_param, page_no)?;
            let page = fetcher.fetch(&url).await?;

            if detect_captcha(&page.body) {
                return Err(ExtractError::CaptchaDetected { url });
            }
            if !page.is_success() {
                if pages == 0 {
                    return Err(ExtractError::BadStatus {
                        url,
                        status: page.status,
                    });
                }
                // Past the first page a 404 is just the end of the listing.
                debug!(status = page.status, page = page_no, "non-success page, stopping");
                break;
            }

            let body: Value = match serde_json::from_str(&page.body) {
                Ok(value) => value,
                Err(_) if pages == 0 => return Err(ExtractError::MalformedResponse { url }),
                Err(e) => {
                    warn!(page = page_no, error = %e, "unparseable page, stopping");
                    break;
                }
            };

            if reported_total.is_none() {
                reported_total = total_count(&body);
            }

            let records = item_records(&body);
            let record_count = records.len();
            let mut new_count = 0u32;
            for (index, record) in records.iter().enumerate() {
                match record_to_item(record, &base, Utc::now()) {
                    Ok(item) => {
                        if seen.insert(item.dedupe_key()) {
                            items.push(item);
                            new_count += 1;
                        }
                    }
                    Err(reason) => {
                        warn!(page = page_no, index, %reason, "record dropped");
                        errors += 1;
                    }
                }
            }
            pages += 1;
            debug!(page = page_no, new = new_count, total = items.len(), "page ingested");

            if new_count == 0 {
                consecutive_empty += 1;
                if consecutive_empty >= grace {
                    debug!(grace, "zero-new-item grace window exhausted");
                    break;
                }
            } else {
                consecutive_empty = 0;
            }

            match has_more(&body) {
                Some(false) => {
                    debug!(page = page_no, "has-more indicator is false");
                    break;
                }
                Some(true) => {}
                None if record_count == 0 => break,
                None => {}
            }
        }

        info!(items = items.len(), pages, errors, "API extraction finished");

        Ok(finalize(
            report,
            strategy,
            ScrapeMethod::Api,
            start,
            RunTally {
                items,
                errors,
                reported_total,
                pages,
            },
        ))
    }
}

/// The endpoint URL with the page parameter set, other query pairs kept.
fn page_url(endpoint: &str, param: &str, page: u32) -> ExtractResult<String> {
    let mut url = Url::parse(endpoint).map_err(|_| ExtractError::InvalidUrl {
        url: endpoint.to_string(),
    })?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != param)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.set_query(None);
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &kept {
            pairs.append_pair(key, value);
        }
        pairs.append_pair(param, &page.to_string());
    }
    Ok(url.to_string())
}

/// The records array of a listing body.
fn item_records(body: &Value) -> Vec<&Value> {
    match body {
        Value::Object(map) => ["products", "items", "data"]
            .iter()
            .find_map(|key| map.get(*key).and_then(|v| v.as_array()))
            .map(|records| records.iter().collect())
            .unwrap_or_default(),
        Value::Array(records) => records.iter().collect(),
        _ => Vec::new(),
    }
}

/// The source's own total record count, when it reports one.
fn total_count(body: &Value) -> Option<u64> {
    let map = body.as_object()?;
    ["total", "total_count", "total_items", "count"]
        .iter()
        .find_map(|key| map.get(*key).and_then(|v| v.as_u64()))
}

/// The body's has-more indicator, when it carries one.
fn has_more(body: &Value) -> Option<bool> {
    let map = body.as_object()?;
    for key in ["has_next", "has_more"] {
        if let Some(flag) = map.get(key).and_then(|v| v.as_bool()) {
            return Some(flag);
        }
    }
    match map.get("next") {
        Some(Value::Null) => Some(false),
        Some(Value::String(_)) | Some(Value::Number(_)) => Some(true),
        _ => None,
    }
}
