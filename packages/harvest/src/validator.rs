//! Consistency validation: reconciling the items artifact against the
//! metadata artifact's own account of the session.
//!
//! Five independently evaluable checks; order does not affect the outcome.
//! The quality score weights the structural checks (cross-reference, schema)
//! at twice the statistical ones. Root causes classify first-match-wins:
//! count, completeness, timestamps, schema, references.

use chrono::Duration as ChronoDuration;

use crate::types::item::ItemsFile;
use crate::types::metadata::MetadataFile;
use crate::types::validation::{
    CheckResult, RootCause, RootCauseReport, Tolerances, ValidationReport,
};

pub const CHECK_ITEM_COUNT: &str = "item_count_consistency";
pub const CHECK_CROSS_REFERENCE: &str = "bidirectional_references";
pub const CHECK_TIMESTAMP: &str = "timestamp_consistency";
pub const CHECK_FIELD_COMPLETENESS: &str = "field_completeness_alignment";
pub const CHECK_SCHEMA: &str = "schema_compliance";

/// Statistical checks deduct 14 points, structural checks 29; all five
/// failing lands exactly on zero.
fn deduction(check_name: &str) -> u8 {
    match check_name {
        CHECK_CROSS_REFERENCE | CHECK_SCHEMA => 29,
        _ => 14,
    }
}

/// Run the full battery and aggregate the result.
///
/// Deterministic: re-running on the same unmodified artifact pair yields an
/// identical report.
pub fn validate(
    items: &ItemsFile,
    metadata: &MetadataFile,
    tolerances: &Tolerances,
) -> ValidationReport {
    let checks = vec![
        check_item_count(items, metadata, tolerances),
        check_cross_references(items, metadata),
        check_timestamp_window(items, metadata, tolerances),
        check_field_completeness(items, metadata, tolerances),
        check_schema(items),
    ];

    let quality_score = checks
        .iter()
        .filter(|c| !c.passed)
        .map(|c| deduction(&c.name))
        .fold(100u8, |score, d| score.saturating_sub(d));

    let root_cause = if checks.iter().all(|c| c.passed) {
        None
    } else {
        Some(classify_root_cause(&checks, items, metadata))
    };

    ValidationReport {
        checks,
        quality_score,
        root_cause,
    }
}

/// Check 1: item count within tolerance.
///
/// Passes when the relative variance OR the absolute difference is within
/// its tolerance, whichever is looser. Both bounds are inclusive: a
/// difference of exactly `item_count_absolute` passes.
fn check_item_count(
    items: &ItemsFile,
    metadata: &MetadataFile,
    tolerances: &Tolerances,
) -> CheckResult {
    let reported = metadata.items_summary.total_items_found;
    let actual = items.len() as u64;
    let diff = reported.abs_diff(actual);

    let within_absolute = diff <= tolerances.item_count_absolute;
    let (variance_pct, within_variance) = if reported == 0 {
        (0.0, within_absolute)
    } else {
        let variance = diff as f64 / reported as f64;
        (variance * 100.0, variance <= tolerances.item_count_variance)
    };

    let detail = format!(
        "reported={reported} actual={actual} variance={variance_pct:.2}% \
         (tolerance {:.2}% or {} absolute)",
        tolerances.item_count_variance * 100.0,
        tolerances.item_count_absolute
    );

    if within_variance || within_absolute {
        CheckResult::pass(CHECK_ITEM_COUNT, detail)
    } else {
        CheckResult::fail(CHECK_ITEM_COUNT, detail)
    }
}

/// Check 2: bidirectional reference symmetry, zero tolerance.
fn check_cross_references(items: &ItemsFile, metadata: &MetadataFile) -> CheckResult {
    let mut problems = Vec::new();

    if items.metadata_file != metadata.output_files.metadata_file {
        problems.push(format!(
            "items artifact references '{}' but the metadata artifact is '{}'",
            items.metadata_file, metadata.output_files.metadata_file
        ));
    }
    if metadata.output_files.items_file.is_empty() {
        problems.push("metadata artifact has no items_file reference".to_string());
    }
    if metadata.output_files.metadata_file.is_empty() {
        problems.push("metadata artifact has no metadata_file identity".to_string());
    }

    if problems.is_empty() {
        CheckResult::pass(
            CHECK_CROSS_REFERENCE,
            format!(
                "items_file='{}' metadata_file='{}'",
                metadata.output_files.items_file, metadata.output_files.metadata_file
            ),
        )
    } else {
        CheckResult::fail(CHECK_CROSS_REFERENCE, problems.join("; "))
    }
}

/// Check 3: every item scraped inside the session window, plus skew.
fn check_timestamp_window(
    items: &ItemsFile,
    metadata: &MetadataFile,
    tolerances: &Tolerances,
) -> CheckResult {
    let skew = ChronoDuration::seconds(tolerances.timestamp_skew_seconds);
    let window_start = metadata.session.start_time - skew;
    let window_end = metadata.session.end_time + skew;

    let mut violations = Vec::new();
    let mut max_deviation = 0i64;

    for (index, item) in items.items.iter().enumerate() {
        let deviation = if item.scraped_at < window_start {
            (window_start - item.scraped_at).num_seconds() + tolerances.timestamp_skew_seconds
        } else if item.scraped_at > window_end {
            (item.scraped_at - window_end).num_seconds() + tolerances.timestamp_skew_seconds
        } else {
            0
        };
        max_deviation = max_deviation.max(deviation);
        if deviation > 0 {
            violations.push(format!("item {index} at {}", item.scraped_at.to_rfc3339()));
        }
    }

    if violations.is_empty() {
        CheckResult::pass(
            CHECK_TIMESTAMP,
            format!(
                "all {} items inside the session window (skew {}s)",
                items.len(),
                tolerances.timestamp_skew_seconds
            ),
        )
    } else {
        let shown: Vec<&String> = violations.iter().take(10).collect();
        CheckResult::fail(
            CHECK_TIMESTAMP,
            format!(
                "{} items outside the window, max deviation {}s: {}",
                violations.len(),
                max_deviation,
                shown
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        )
    }
}

/// Check 4: reported field completeness against the data itself.
fn check_field_completeness(
    items: &ItemsFile,
    metadata: &MetadataFile,
    tolerances: &Tolerances,
) -> CheckResult {
    let tolerance_points = tolerances.field_completeness_variance * 100.0;
    let mismatches = completeness_mismatches(items, metadata, tolerance_points);

    if mismatches.is_empty() {
        CheckResult::pass(
            CHECK_FIELD_COMPLETENESS,
            format!(
                "{} reported fields within {tolerance_points:.1} points",
                metadata.field_completeness.len()
            ),
        )
    } else {
        let detail = mismatches
            .iter()
            .map(|m| {
                format!(
                    "{} reported={:.1}% actual={:.1}%",
                    m.field, m.reported, m.actual
                )
            })
            .collect::<Vec<_>>()
            .join("; ");
        CheckResult::fail(CHECK_FIELD_COMPLETENESS, detail)
    }
}

/// Check 5: every item satisfies the declared shape, zero tolerance.
fn check_schema(items: &ItemsFile) -> CheckResult {
    let mut violations = Vec::new();
    for (index, item) in items.items.iter().enumerate() {
        for violation in item.schema_violations() {
            violations.push(format!("item {index}: {violation}"));
        }
    }

    if violations.is_empty() {
        CheckResult::pass(
            CHECK_SCHEMA,
            format!("{} items conform", items.len()),
        )
    } else {
        let shown: Vec<&String> = violations.iter().take(10).collect();
        CheckResult::fail(
            CHECK_SCHEMA,
            format!(
                "{} violations: {}",
                violations.len(),
                shown
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join("; ")
            ),
        )
    }
}

struct CompletenessMismatch {
    field: String,
    reported: f64,
    actual: f64,
}

fn completeness_mismatches(
    items: &ItemsFile,
    metadata: &MetadataFile,
    tolerance_points: f64,
) -> Vec<CompletenessMismatch> {
    metadata
        .field_completeness
        .iter()
        .filter_map(|(field, reported)| {
            let actual = actual_completeness(items, field);
            ((reported - actual).abs() > tolerance_points).then(|| CompletenessMismatch {
                field: field.clone(),
                reported: *reported,
                actual,
            })
        })
        .collect()
}

/// Percentage of items with a non-empty value for a field.
pub fn actual_completeness(items: &ItemsFile, field: &str) -> f64 {
    if items.is_empty() {
        return 0.0;
    }
    let non_empty = items
        .items
        .iter()
        .filter(|item| match field {
            "title" => !item.title.trim().is_empty(),
            "price" => item.price.as_ref().is_some_and(|p| p.amount > 0.0),
            "image_urls" => !item.image_urls.is_empty(),
            "description" => item
                .description
                .as_deref()
                .is_some_and(|d| !d.trim().is_empty()),
            "url" => !item.url.trim().is_empty(),
            "id" => item.id.is_some(),
            _ => false,
        })
        .count();
    (non_empty as f64 / items.len() as f64) * 100.0
}

/// First-match-wins classification over the failing-check pattern.
fn classify_root_cause(
    checks: &[CheckResult],
    items: &ItemsFile,
    metadata: &MetadataFile,
) -> RootCauseReport {
    let failed = |name: &str| checks.iter().any(|c| c.name == name && !c.passed);

    if failed(CHECK_ITEM_COUNT) {
        let reported = metadata.items_summary.total_items_found;
        let actual = items.len() as u64;
        let evidence = if actual < reported {
            format!(
                "dataset holds {actual} items but the source reported {reported}; \
                 the pagination loop stopped {} records early",
                reported - actual
            )
        } else {
            format!(
                "dataset holds {actual} items but the source reported {reported}; \
                 {} extra records suggest duplicates slipped past dedup",
                actual - reported
            )
        };
        return RootCauseReport {
            category: RootCause::PaginationTerminatedEarly,
            evidence,
            recommended_fix: "Review the pagination termination condition; widen the \
                              zero-new-item grace window before giving up."
                .to_string(),
        };
    }

    if failed(CHECK_FIELD_COMPLETENESS) {
        let mismatches = completeness_mismatches(items, metadata, 0.0);
        let worst = mismatches
            .iter()
            .max_by(|a, b| {
                let da = (a.reported - a.actual).abs();
                let db = (b.reported - b.actual).abs();
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            });
        let (field, evidence) = match worst {
            Some(m) => (
                m.field.clone(),
                format!(
                    "completeness mismatch concentrated in `{}` (reported {:.1}%, actual {:.1}%)",
                    m.field, m.reported, m.actual
                ),
            ),
            None => ("unknown".to_string(), "completeness mismatch".to_string()),
        };
        return RootCauseReport {
            category: RootCause::SelectorMismatch,
            evidence,
            recommended_fix: format!(
                "Add a fallback selector for `{field}`; the primary selector is not \
                 matching every variant. Requires review before re-running."
            ),
        };
    }

    if failed(CHECK_TIMESTAMP) {
        let detail = checks
            .iter()
            .find(|c| c.name == CHECK_TIMESTAMP)
            .map(|c| c.detail.clone())
            .unwrap_or_default();
        return RootCauseReport {
            category: RootCause::TimingSkew,
            evidence: detail,
            recommended_fix: "Fix session clock bookkeeping: items are stamped outside \
                              the recorded session window."
                .to_string(),
        };
    }

    if failed(CHECK_SCHEMA) {
        let detail = checks
            .iter()
            .find(|c| c.name == CHECK_SCHEMA)
            .map(|c| c.detail.clone())
            .unwrap_or_default();
        return RootCauseReport {
            category: RootCause::SchemaViolation,
            evidence: detail,
            recommended_fix: "Repair item construction so every record satisfies the \
                              declared shape before artifacts are written."
                .to_string(),
        };
    }

    let detail = checks
        .iter()
        .find(|c| c.name == CHECK_CROSS_REFERENCE)
        .map(|c| c.detail.clone())
        .unwrap_or_default();
    RootCauseReport {
        category: RootCause::CrossReferenceBreak,
        evidence: detail,
        recommended_fix: "Regenerate the artifact pair; the two files do not reference \
                          each other."
            .to_string(),
    }
}
