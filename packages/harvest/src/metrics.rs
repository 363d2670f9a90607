//! Append-only session metrics log.
//!
//! One line-delimited JSON record per completed session, consumed by an
//! external reporting collaborator. The core only appends; it never reads
//! the log back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use scout::types::ScrapeMethod;

use crate::pipeline::SessionStatus;

/// One completed session, flattened for the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub timestamp: DateTime<Utc>,
    pub source_name: String,
    pub method: ScrapeMethod,
    pub duration_seconds: f64,
    pub items_scraped: u64,
    pub quality_score: u8,
    pub status: SessionStatus,
    pub error: Option<String>,
}

/// Appends session records to a JSONL file.
pub struct MetricsLog {
    path: PathBuf,
}

impl MetricsLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single JSON line.
    pub async fn append(&self, record: &SessionRecord) -> std::io::Result<()> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let log = MetricsLog::new(dir.path().join("sessions.jsonl"));

        for (name, status) in [
            ("shop_one", SessionStatus::Success),
            ("shop_two", SessionStatus::ValidationFailed),
        ] {
            log.append(&SessionRecord {
                timestamp: Utc::now(),
                source_name: name.to_string(),
                method: ScrapeMethod::Api,
                duration_seconds: 1.25,
                items_scraped: 42,
                quality_score: 96,
                status,
                error: None,
            })
            .await
            .unwrap();
        }

        let contents = tokio::fs::read_to_string(log.path()).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: SessionRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.source_name, "shop_one");
        assert!(matches!(first.status, SessionStatus::Success));

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["status"], "validation_failed");
    }
}
