//! Validation reports, tolerances, and root-cause categories.

use serde::{Deserialize, Serialize};

/// Configurable thresholds below which a statistical discrepancy is accepted
/// as noise rather than a defect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tolerances {
    /// Item count variance as a fraction of the reported total
    pub item_count_variance: f64,

    /// Absolute item count difference accepted regardless of the fraction
    /// (inclusive)
    pub item_count_absolute: u64,

    /// Seconds of clock skew allowed around the session window
    pub timestamp_skew_seconds: i64,

    /// Field-completeness variance as a fraction (0.05 = five percentage
    /// points)
    pub field_completeness_variance: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            item_count_variance: 0.02,
            item_count_absolute: 3,
            timestamp_skew_seconds: 60,
            field_completeness_variance: 0.05,
        }
    }
}

/// Result of one cross-check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            detail: detail.into(),
        }
    }

    pub fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            detail: detail.into(),
        }
    }
}

/// Categorical explanation for a validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootCause {
    PaginationTerminatedEarly,
    SelectorMismatch,
    TimingSkew,
    SchemaViolation,
    CrossReferenceBreak,
}

impl RootCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            RootCause::PaginationTerminatedEarly => "pagination_terminated_early",
            RootCause::SelectorMismatch => "selector_mismatch",
            RootCause::TimingSkew => "timing_skew",
            RootCause::SchemaViolation => "schema_violation",
            RootCause::CrossReferenceBreak => "cross_reference_break",
        }
    }
}

impl std::fmt::Display for RootCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified root cause with its evidence.
///
/// Produced only on validation failure, consumed by the repair advisor, and
/// discarded once a repair decision is logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootCauseReport {
    pub category: RootCause,
    pub evidence: String,
    pub recommended_fix: String,
}

/// The product of one validation run.
///
/// Computed, never persisted as source of truth; regenerated on every run.
/// Carries no timestamp so the same artifact pair always validates to an
/// identical report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub checks: Vec<CheckResult>,

    /// 100 minus weighted deductions per failing check
    pub quality_score: u8,

    pub root_cause: Option<RootCauseReport>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failing_checks(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }
}
