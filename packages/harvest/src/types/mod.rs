//! Artifact and validation data types.

pub mod item;
pub mod metadata;
pub mod validation;

pub use item::{Item, ItemsFile, Price};
pub use metadata::{
    InvestigationNotes, ItemsSummary, MetadataFile, OutputFiles, PaginationInfo, SessionInfo,
};
pub use validation::{
    CheckResult, RootCause, RootCauseReport, Tolerances, ValidationReport,
};
