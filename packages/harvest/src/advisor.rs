//! Mapping a root cause to a repair decision.
//!
//! Only one category warrants an automatic retry: early pagination
//! termination, retried once with a widened grace window. Selector fixes
//! are recommended but never applied without review, and artifact-generation
//! bugs (timing skew, reference breaks) must be fixed before re-running.

use serde::{Deserialize, Serialize};
use tracing::info;

use scout::types::{PaginationStrategy, TerminationCondition};

use crate::types::validation::{RootCause, RootCauseReport};

/// How much the zero-new-item grace window widens on a retry.
const GRACE_WIDENING: u32 = 2;

/// The advisor's decision for one root cause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairAdvice {
    /// Whether an extraction retry is warranted
    pub retry: bool,

    /// Strategy to retry with, when retrying
    pub adjusted_strategy: Option<PaginationStrategy>,

    /// Guidance text; structural recommendations are never auto-applied
    pub recommendation: String,
}

/// Decide whether a retry is warranted and with what adjustments.
pub fn advise(root_cause: &RootCauseReport, strategy: &PaginationStrategy) -> RepairAdvice {
    let advice = match root_cause.category {
        RootCause::PaginationTerminatedEarly => {
            let adjusted = widen_grace(strategy);
            RepairAdvice {
                retry: true,
                adjusted_strategy: Some(adjusted),
                recommendation: format!(
                    "Retry with a widened grace window. {}",
                    root_cause.recommended_fix
                ),
            }
        }
        RootCause::SelectorMismatch => RepairAdvice {
            retry: false,
            adjusted_strategy: None,
            recommendation: format!(
                "{} A human must review the fallback selector before any re-run.",
                root_cause.recommended_fix
            ),
        },
        RootCause::TimingSkew | RootCause::CrossReferenceBreak => RepairAdvice {
            retry: false,
            adjusted_strategy: None,
            recommendation: format!(
                "No retry: this is a bug in artifact generation, not extraction \
                 quality. {}",
                root_cause.recommended_fix
            ),
        },
        RootCause::SchemaViolation => RepairAdvice {
            retry: false,
            adjusted_strategy: None,
            recommendation: format!(
                "No retry: schema violations are never auto-retried. {}",
                root_cause.recommended_fix
            ),
        },
    };

    info!(
        category = %root_cause.category,
        retry = advice.retry,
        "repair advice issued"
    );

    advice
}

/// Clone the strategy with a looser zero-new-item window.
fn widen_grace(strategy: &PaginationStrategy) -> PaginationStrategy {
    let mut adjusted = strategy.clone();
    adjusted.termination = match &strategy.termination {
        TerminationCondition::NoNewItems { attempts } => TerminationCondition::NoNewItems {
            attempts: attempts + GRACE_WIDENING,
        },
        // Other stop signals keep their trigger; the executor's implicit
        // grace window is what widens.
        other => other.clone(),
    };
    adjusted.notes = Some(match &strategy.notes {
        Some(notes) => format!("{notes}; grace window widened for retry"),
        None => "grace window widened for retry".to_string(),
    });
    adjusted
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout::types::Confidence;

    fn report(category: RootCause) -> RootCauseReport {
        RootCauseReport {
            category,
            evidence: "evidence".to_string(),
            recommended_fix: "fix it".to_string(),
        }
    }

    fn scroll_strategy() -> PaginationStrategy {
        let mut strategy = PaginationStrategy::single_page(".item");
        strategy.pagination_type = scout::types::PaginationType::InfiniteScroll;
        strategy.termination = TerminationCondition::NoNewItems { attempts: 3 };
        strategy.confidence = Confidence::High;
        strategy
    }

    #[test]
    fn test_early_termination_retries_with_wider_grace() {
        let advice = advise(
            &report(RootCause::PaginationTerminatedEarly),
            &scroll_strategy(),
        );

        assert!(advice.retry);
        let adjusted = advice.adjusted_strategy.unwrap();
        assert_eq!(
            adjusted.termination,
            TerminationCondition::NoNewItems { attempts: 5 }
        );
        assert!(adjusted.notes.unwrap().contains("widened"));
    }

    #[test]
    fn test_selector_mismatch_requires_review() {
        let advice = advise(&report(RootCause::SelectorMismatch), &scroll_strategy());
        assert!(!advice.retry);
        assert!(advice.adjusted_strategy.is_none());
        assert!(advice.recommendation.contains("review"));
    }

    #[test]
    fn test_generation_bugs_never_retry() {
        for category in [RootCause::TimingSkew, RootCause::CrossReferenceBreak] {
            let advice = advise(&report(category), &scroll_strategy());
            assert!(!advice.retry);
            assert!(advice.recommendation.contains("artifact generation"));
        }
    }

    #[test]
    fn test_schema_violation_never_retries() {
        let advice = advise(&report(RootCause::SchemaViolation), &scroll_strategy());
        assert!(!advice.retry);
        assert!(advice.recommendation.contains("never auto-retried"));
    }
}
