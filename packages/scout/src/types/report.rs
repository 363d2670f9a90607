//! Investigation reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::endpoint::{Confidence, ProbeOutcome, ProbedEndpoint};

/// How records get pulled out of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeMethod {
    /// Drive a JSON API directly
    Api,
    /// Drive a browser and read the rendered page
    Browser,
}

impl ScrapeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeMethod::Api => "api",
            ScrapeMethod::Browser => "browser",
        }
    }
}

impl std::fmt::Display for ScrapeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters and notes about how an investigation ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestigationMetadata {
    /// Candidates handed to the probe pool
    pub endpoints_probed: usize,

    /// Candidates that came back as JSON
    pub endpoints_found: usize,

    /// Techniques that contributed candidates
    #[serde(default)]
    pub techniques_used: Vec<String>,
}

/// The read-only product of one investigation.
///
/// Created once, never mutated. May be cached keyed by normalized URL (see
/// [`crate::cache::ReportCache`]); eviction is time-based only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestigationReport {
    /// URL that was investigated
    pub target_url: String,

    /// When the investigation started
    pub timestamp: DateTime<Utc>,

    /// Best-matching platform, if any fingerprint matched
    pub platform_detected: Option<String>,

    /// Confidence of the platform match (`Low` when no match)
    pub platform_confidence: Confidence,

    /// Every candidate, annotated with its probe result
    pub endpoints: Vec<ProbedEndpoint>,

    /// Recommended extraction method
    pub recommended_strategy: ScrapeMethod,

    /// Aggregate confidence in the recommendation, 0.0 to 1.0
    pub confidence_score: f64,

    /// Wall-clock duration of the investigation
    pub duration_ms: u64,

    pub metadata: InvestigationMetadata,
}

impl InvestigationReport {
    /// The best probed JSON endpoint, by confidence then probe order.
    pub fn best_api_endpoint(&self) -> Option<&ProbedEndpoint> {
        self.endpoints
            .iter()
            .filter(|e| e.outcome == ProbeOutcome::Json)
            .max_by_key(|e| e.confidence)
    }

    /// URLs of every endpoint that returned JSON.
    pub fn api_endpoints_found(&self) -> Vec<String> {
        self.endpoints
            .iter()
            .filter(|e| e.outcome == ProbeOutcome::Json)
            .map(|e| e.url.clone())
            .collect()
    }

    /// Serialize for external inspection.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::endpoint::EndpointCandidate;

    fn probed(url: &str, confidence: Confidence, outcome: ProbeOutcome) -> ProbedEndpoint {
        let mut endpoint = ProbedEndpoint::untested(&EndpointCandidate::new(url));
        endpoint.tested = true;
        endpoint.confidence = confidence;
        endpoint.outcome = outcome;
        endpoint
    }

    #[test]
    fn test_best_api_endpoint_prefers_confidence() {
        let report = InvestigationReport {
            target_url: "https://example.com".to_string(),
            timestamp: Utc::now(),
            platform_detected: None,
            platform_confidence: Confidence::Low,
            endpoints: vec![
                probed("https://example.com/api/products", Confidence::Low, ProbeOutcome::Json),
                probed("https://example.com/products.json", Confidence::High, ProbeOutcome::Json),
                probed("https://example.com/feed", Confidence::High, ProbeOutcome::Html),
            ],
            recommended_strategy: ScrapeMethod::Api,
            confidence_score: 0.8,
            duration_ms: 12,
            metadata: InvestigationMetadata {
                endpoints_probed: 3,
                endpoints_found: 2,
                techniques_used: vec![],
            },
        };

        let best = report.best_api_endpoint().unwrap();
        assert_eq!(best.url, "https://example.com/products.json");
        assert_eq!(report.api_endpoints_found().len(), 2);
    }
}
