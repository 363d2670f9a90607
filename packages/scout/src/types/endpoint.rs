//! Endpoint candidates and their probe annotations.

use serde::{Deserialize, Serialize};

/// Bucketed confidence level for detections.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate API endpoint before probing.
///
/// Produced by the platform registry, script mining, or the generic fallback
/// list. Immutable once probed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointCandidate {
    /// Endpoint URL
    pub url: String,

    /// HTTP method (always GET today)
    pub method: String,

    /// Content type we expect a useful response to carry
    pub expected_content_type: String,

    /// Pre-probe confidence, based on where the candidate came from
    pub confidence: Confidence,
}

impl EndpointCandidate {
    /// Create a GET/JSON candidate with low confidence.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            expected_content_type: "application/json".to_string(),
            confidence: Confidence::Low,
        }
    }

    /// Set the pre-probe confidence.
    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }
}

/// How a probe response classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// 2xx with a parseable JSON body
    Json,
    /// 2xx but not JSON
    Html,
    /// 401 or 403
    AuthRequired,
    /// Any other status, unparseable body, or transport failure
    Error,
    /// Probe never ran (budget exhausted)
    NotTested,
}

/// A candidate annotated with its probe result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbedEndpoint {
    pub url: String,
    pub method: String,
    pub expected_content_type: String,

    /// Post-probe confidence, derived from core-field overlap in the sample
    pub confidence: Confidence,

    /// Whether the probe actually ran
    pub tested: bool,

    /// HTTP status if a response came back
    pub status_code: Option<u16>,

    /// Classification of the response
    pub outcome: ProbeOutcome,

    /// Field names sampled from the first record (first 10)
    #[serde(default)]
    pub sample_fields: Vec<String>,

    /// Whether pagination indicator keys appeared in the body
    #[serde(default)]
    pub pagination_detected: bool,
}

impl ProbedEndpoint {
    /// Annotate a candidate that was never probed.
    pub fn untested(candidate: &EndpointCandidate) -> Self {
        Self {
            url: candidate.url.clone(),
            method: candidate.method.clone(),
            expected_content_type: candidate.expected_content_type.clone(),
            confidence: candidate.confidence,
            tested: false,
            status_code: None,
            outcome: ProbeOutcome::NotTested,
            sample_fields: Vec::new(),
            pagination_detected: false,
        }
    }

    /// Whether this endpoint returned structured JSON with core fields.
    pub fn is_structured(&self) -> bool {
        self.outcome == ProbeOutcome::Json && self.confidence >= Confidence::Medium
    }
}
