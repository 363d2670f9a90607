//! Session pipeline: Investigate -> Classify -> Extract -> Validate ->
//! (optionally) Advise and retry once.
//!
//! Phases run strictly in order; no phase begins before the prior phase's
//! artifact is fully produced. Retry is a single, explicit, advisor-gated
//! loop, never automatic backoff. A failed validation still returns the
//! best-effort artifacts plus the reports; a partially-correct dataset is
//! never discarded.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use scout::browser::BrowserDriver;
use scout::classifier::{classify_pagination, ClassifyConfig};
use scout::fetch::Fetcher;
use scout::investigator::{Investigator, InvestigatorConfig};
use scout::types::{
    Confidence, InvestigationReport, PaginationStrategy, ScrapeMethod,
};

use crate::advisor::{advise, RepairAdvice};
use crate::artifacts::{write_artifacts, write_json, SessionArtifacts};
use crate::error::ExtractError;
use crate::executor::{ExecutorConfig, ExtractionExecutor};
use crate::metrics::{MetricsLog, SessionRecord};
use crate::parse::source_slug;
use crate::types::validation::{Tolerances, ValidationReport};
use crate::validator::validate;

/// Terminal status of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Success,
    InvestigationFailed,
    ExtractionFailed,
    ValidationFailed,
}

impl SessionStatus {
    /// Process exit code for callers that surface one.
    pub fn exit_code(self) -> i32 {
        match self {
            SessionStatus::Success => 0,
            SessionStatus::InvestigationFailed => 1,
            SessionStatus::ExtractionFailed => 2,
            SessionStatus::ValidationFailed => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Success => "success",
            SessionStatus::InvestigationFailed => "investigation_failed",
            SessionStatus::ExtractionFailed => "extraction_failed",
            SessionStatus::ValidationFailed => "validation_failed",
        }
    }
}

/// Configuration accepted at the pipeline boundary.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub investigate_timeout: Duration,

    /// Behavioral classification tunables, including its timeout
    pub classify: ClassifyConfig,

    pub extract_timeout: Duration,

    /// Hard page ceiling passed through to the executor
    pub max_pages: Option<u32>,

    /// Pacing between paginated fetches
    pub requests_per_second: u32,

    pub tolerances: Tolerances,

    /// Skip the classifier's auto-selection when the caller already knows
    /// the strategy
    pub forced_method: Option<ScrapeMethod>,

    /// Directory for artifacts and report JSON, when persistence is wanted
    pub output_dir: Option<PathBuf>,

    /// Append-only session log, when one is wanted
    pub metrics_log: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            investigate_timeout: Duration::from_secs(30),
            classify: ClassifyConfig::default(),
            extract_timeout: Duration::from_secs(300),
            max_pages: None,
            requests_per_second: 2,
            tolerances: Tolerances::default(),
            forced_method: None,
            output_dir: None,
            metrics_log: None,
        }
    }
}

/// Everything a session produced, best-effort on failure.
#[derive(Debug, Serialize)]
pub struct SessionOutcome {
    pub target_url: String,
    pub status: SessionStatus,
    pub report: Option<InvestigationReport>,
    pub strategy: Option<PaginationStrategy>,
    pub artifacts: Option<SessionArtifacts>,
    pub validation: Option<ValidationReport>,
    pub advice: Option<RepairAdvice>,
    pub error: Option<String>,
}

impl SessionOutcome {
    fn new(target_url: &str, status: SessionStatus) -> Self {
        Self {
            target_url: target_url.to_string(),
            status,
            report: None,
            strategy: None,
            artifacts: None,
            validation: None,
            advice: None,
            error: None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }
}

/// One extraction pipeline over a shared fetcher.
///
/// Sessions are independent; run several pipelines in parallel against
/// different targets and nothing is shared but the fetcher's connection
/// pool.
pub struct Pipeline<F: Fetcher + 'static> {
    fetcher: Arc<F>,
    investigator: Investigator<F>,
    executor: ExtractionExecutor,
    config: PipelineConfig,
}

impl<F: Fetcher + 'static> Pipeline<F> {
    pub fn new(fetcher: F) -> Self {
        Self::with_config(fetcher, PipelineConfig::default())
    }

    pub fn with_config(fetcher: F, config: PipelineConfig) -> Self {
        let fetcher = Arc::new(fetcher);
        let investigator = Investigator::with_shared(
            Arc::clone(&fetcher),
            InvestigatorConfig {
                timeout: config.investigate_timeout,
                ..Default::default()
            },
        );
        let executor = ExtractionExecutor::with_config(ExecutorConfig {
            requests_per_second: config.requests_per_second,
            max_pages: config.max_pages,
            timeout: config.extract_timeout,
            ..Default::default()
        });
        Self {
            fetcher,
            investigator,
            executor,
            config,
        }
    }

    /// Run a full session, with a browser available for classification and
    /// browser-strategy extraction.
    pub async fn run<D: BrowserDriver>(&self, target_url: &str, driver: &mut D) -> SessionOutcome {
        self.run_session(target_url, Some(driver as &mut dyn BrowserDriver))
            .await
    }

    /// Run a session without a browser.
    ///
    /// The session can only succeed down the API path; a browser
    /// recommendation without a forced override fails the extraction phase.
    pub async fn run_api(&self, target_url: &str) -> SessionOutcome {
        self.run_session(target_url, None).await
    }

    async fn run_session(
        &self,
        target_url: &str,
        mut driver: Option<&mut dyn BrowserDriver>,
    ) -> SessionOutcome {
        let started = Utc::now();
        info!(url = %target_url, "session starting");

        // Phase 1: investigation.
        let report = match self
            .investigator
            .investigate_with_timeout(target_url, self.config.investigate_timeout)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                warn!(url = %target_url, error = %e, "investigation failed");
                let mut outcome =
                    SessionOutcome::new(target_url, SessionStatus::InvestigationFailed);
                outcome.error = Some(e.to_string());
                return self.seal(outcome, started).await;
            }
        };

        let method = self
            .config
            .forced_method
            .unwrap_or(report.recommended_strategy);

        // Phase 2: pagination classification, unless the caller forced the
        // API path or no browser is available to probe with.
        let strategy = if method == ScrapeMethod::Api
            && (self.config.forced_method.is_some() || driver.is_none())
        {
            api_strategy_from(&report)
        } else {
            match driver.as_deref_mut() {
                None => {
                    let mut outcome =
                        SessionOutcome::new(target_url, SessionStatus::ExtractionFailed);
                    outcome.report = Some(report);
                    outcome.error =
                        Some("browser strategy requires a browser driver".to_string());
                    return self.seal(outcome, started).await;
                }
                Some(driver) => {
                    match classify_pagination(driver, target_url, &self.config.classify).await {
                        Ok(strategy) => strategy,
                        Err(e) => {
                            warn!(url = %target_url, error = %e, "classification failed");
                            let mut outcome = SessionOutcome::new(
                                target_url,
                                SessionStatus::InvestigationFailed,
                            );
                            outcome.report = Some(report);
                            outcome.error = Some(e.to_string());
                            return self.seal(outcome, started).await;
                        }
                    }
                }
            }
        };

        // Phases 3-5: extract, validate, and retry at most once when the
        // advisor says it is worthwhile.
        let mut attempt_strategy = strategy;
        let mut advice: Option<RepairAdvice> = None;
        let mut retried = false;

        loop {
            let result = match method {
                ScrapeMethod::Api => {
                    self.executor
                        .extract_api(self.fetcher.as_ref(), &report, &attempt_strategy)
                        .await
                }
                ScrapeMethod::Browser => match driver.as_deref_mut() {
                    Some(driver) => {
                        self.executor
                            .extract_browser(driver, &report, &attempt_strategy)
                            .await
                    }
                    None => Err(ExtractError::Driver(scout::error::DriverError::Closed)),
                },
            };

            let artifacts = match result {
                Ok(artifacts) => artifacts,
                Err(e) => {
                    warn!(url = %target_url, error = %e, "extraction failed");
                    let mut outcome =
                        SessionOutcome::new(target_url, SessionStatus::ExtractionFailed);
                    outcome.report = Some(report);
                    outcome.strategy = Some(attempt_strategy);
                    outcome.advice = advice;
                    outcome.error = Some(e.to_string());
                    return self.seal(outcome, started).await;
                }
            };

            let validation = validate(
                &artifacts.items,
                &artifacts.metadata,
                &self.config.tolerances,
            );

            if validation.passed() {
                let mut outcome = SessionOutcome::new(target_url, SessionStatus::Success);
                outcome.report = Some(report);
                outcome.strategy = Some(attempt_strategy);
                outcome.artifacts = Some(artifacts);
                outcome.validation = Some(validation);
                outcome.advice = advice;
                return self.seal(outcome, started).await;
            }

            if !retried {
                if let Some(root_cause) = &validation.root_cause {
                    let repair = advise(root_cause, &attempt_strategy);
                    let should_retry = repair.retry;
                    let adjusted = repair.adjusted_strategy.clone();
                    advice = Some(repair);
                    if should_retry {
                        retried = true;
                        if let Some(adjusted) = adjusted {
                            attempt_strategy = adjusted;
                        }
                        info!(url = %target_url, "advisor-gated retry");
                        continue;
                    }
                }
            }

            // Validation failed for good; the best-effort artifacts are
            // still part of the outcome.
            let mut outcome = SessionOutcome::new(target_url, SessionStatus::ValidationFailed);
            outcome.report = Some(report);
            outcome.strategy = Some(attempt_strategy);
            outcome.artifacts = Some(artifacts);
            outcome.validation = Some(validation);
            outcome.advice = advice;
            return self.seal(outcome, started).await;
        }
    }

    /// Persist outputs, append the session record, and log the terminus.
    async fn seal(
        &self,
        outcome: SessionOutcome,
        started: chrono::DateTime<Utc>,
    ) -> SessionOutcome {
        if let Some(dir) = &self.config.output_dir {
            if let Err(e) = tokio::fs::create_dir_all(dir).await {
                warn!(dir = %dir.display(), error = %e, "could not create output dir");
            } else {
                let slug = source_slug(&outcome.target_url);
                if let Some(artifacts) = &outcome.artifacts {
                    if let Err(e) = write_artifacts(dir, artifacts).await {
                        warn!(error = %e, "failed writing artifacts");
                    }
                }
                if let Some(report) = &outcome.report {
                    let path = dir.join(format!("{slug}_investigation.json"));
                    if let Err(e) = write_json(&path, report).await {
                        warn!(error = %e, "failed writing investigation report");
                    }
                }
                if let Some(strategy) = &outcome.strategy {
                    let path = dir.join(format!("{slug}_strategy.json"));
                    if let Err(e) = write_json(&path, strategy).await {
                        warn!(error = %e, "failed writing pagination strategy");
                    }
                }
            }
        }

        if let Some(path) = &self.config.metrics_log {
            let record = self.session_record(&outcome, started);
            if let Err(e) = MetricsLog::new(path).append(&record).await {
                warn!(error = %e, "failed appending session record");
            }
        }

        info!(
            url = %outcome.target_url,
            status = outcome.status.as_str(),
            items = outcome
                .artifacts
                .as_ref()
                .map(|a| a.items.len())
                .unwrap_or(0),
            "session finished"
        );

        outcome
    }

    fn session_record(
        &self,
        outcome: &SessionOutcome,
        started: chrono::DateTime<Utc>,
    ) -> SessionRecord {
        let method = outcome
            .artifacts
            .as_ref()
            .map(|a| a.metadata.session.method)
            .or(self.config.forced_method)
            .or(outcome.report.as_ref().map(|r| r.recommended_strategy))
            .unwrap_or(ScrapeMethod::Browser);

        SessionRecord {
            timestamp: Utc::now(),
            source_name: outcome
                .artifacts
                .as_ref()
                .map(|a| a.metadata.session.source_name.clone())
                .unwrap_or_else(|| source_slug(&outcome.target_url)),
            method,
            duration_seconds: (Utc::now() - started).num_milliseconds() as f64 / 1000.0,
            items_scraped: outcome
                .artifacts
                .as_ref()
                .map(|a| a.items.len() as u64)
                .unwrap_or(0),
            quality_score: outcome
                .validation
                .as_ref()
                .map(|v| v.quality_score)
                .unwrap_or(0),
            status: outcome.status,
            error: outcome.error.clone(),
        }
    }
}

/// Synthesize an API strategy straight from probe signals, for sessions that
/// skip behavioral classification.
fn api_strategy_from(report: &InvestigationReport) -> PaginationStrategy {
    let pagination_seen = report
        .best_api_endpoint()
        .map(|e| e.pagination_detected)
        .unwrap_or(false);
    let mut strategy = PaginationStrategy::api("page", "has_more");
    strategy.confidence = if pagination_seen {
        Confidence::Medium
    } else {
        Confidence::Low
    };
    strategy.notes = Some("derived from probe signals without behavioral classification".to_string());
    strategy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(SessionStatus::Success.exit_code(), 0);
        assert_eq!(SessionStatus::InvestigationFailed.exit_code(), 1);
        assert_eq!(SessionStatus::ExtractionFailed.exit_code(), 2);
        assert_eq!(SessionStatus::ValidationFailed.exit_code(), 3);
    }

    #[test]
    fn test_api_strategy_from_probe_signals() {
        let report = crate::executor::test_support::api_report();
        let strategy = api_strategy_from(&report);

        assert_eq!(strategy.selectors.page_param.as_deref(), Some("page"));
        assert_eq!(strategy.confidence, Confidence::Medium);

        let no_signal = crate::executor::test_support::browser_report();
        let strategy = api_strategy_from(&no_signal);
        assert_eq!(strategy.confidence, Confidence::Low);
    }
}
