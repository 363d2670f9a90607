//! Extraction Execution & Cross-Validation Library
//!
//! The execution half of the system: drives the strategy the reconnaissance
//! phase chose, accumulates items into a dataset artifact paired with a
//! metadata artifact, cross-validates the two against configurable
//! tolerances, and maps failures to a root-cause-driven repair decision.
//!
//! # Usage
//!
//! ```rust,ignore
//! use harvest::{Pipeline, PipelineConfig};
//! use scout::HttpFetcher;
//!
//! let pipeline = Pipeline::new(HttpFetcher::new());
//! let outcome = pipeline.run("https://shop.example.com", &mut driver).await;
//! std::process::exit(outcome.exit_code());
//! ```
//!
//! # Modules
//!
//! - [`executor`] - The extraction state machine with API and browser drivers
//! - [`validator`] - The five-check consistency battery
//! - [`advisor`] - Root cause to repair decision mapping
//! - [`pipeline`] - Session orchestration and status codes
//! - [`artifacts`] - Artifact naming and JSON persistence
//! - [`metrics`] - The append-only session log
//! - [`types`] - Items, metadata, and validation types
//! - [`testing`] - Scripted sources and consistent artifact pairs

pub mod advisor;
pub mod artifacts;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod parse;
pub mod pipeline;
pub mod testing;
pub mod types;
pub mod validator;

// Re-export core types at crate root
pub use advisor::{advise, RepairAdvice};
pub use artifacts::{artifact_names, load_artifacts, write_artifacts, SessionArtifacts};
pub use error::{ArtifactError, ExtractError};
pub use executor::{ExecutorConfig, ExecutorState, ExtractionExecutor};
pub use metrics::{MetricsLog, SessionRecord};
pub use pipeline::{Pipeline, PipelineConfig, SessionOutcome, SessionStatus};
pub use types::{
    CheckResult, InvestigationNotes, Item, ItemsFile, ItemsSummary, MetadataFile, OutputFiles,
    PaginationInfo, Price, RootCause, RootCauseReport, SessionInfo, Tolerances, ValidationReport,
};
pub use validator::validate;
