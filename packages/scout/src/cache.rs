//! Time-based cache for investigation reports.
//!
//! An explicit keyed store rather than ambient global state, so session
//! behavior stays composable. Eviction is time-based only; there is no
//! dependency tracking.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use url::Url;

use crate::types::report::InvestigationReport;

/// Default report TTL: 15 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

struct CacheEntry {
    stored_at: Instant,
    report: InvestigationReport,
}

/// TTL cache keyed by normalized target URL.
pub struct ReportCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl Default for ReportCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ReportCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a fresh report; expired entries are evicted on the way.
    pub fn get(&self, key: &str) -> Option<InvestigationReport> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.report.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: impl Into<String>, report: InvestigationReport) {
        self.entries.lock().unwrap().insert(
            key.into(),
            CacheEntry {
                stored_at: Instant::now(),
                report,
            },
        );
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Normalize a URL into a cache key.
///
/// Lowercased host, default port dropped, trailing slash trimmed, fragment
/// dropped; the query survives since different queries are different listings.
pub fn normalize_url(raw: &str) -> Result<String, url::ParseError> {
    let url = Url::parse(raw)?;
    let mut normalized = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        normalized.push(':');
        normalized.push_str(&port.to_string());
    }
    normalized.push_str(url.path().trim_end_matches('/'));
    if let Some(query) = url.query() {
        normalized.push('?');
        normalized.push_str(query);
    }
    Ok(normalized)
}
