//! Artifact naming and JSON persistence.
//!
//! The two JSON artifacts are the durable boundary contract:
//! `{source}_items_{timestamp}.json` and `{source}_metadata_{timestamp}.json`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

use crate::error::{ArtifactError, ArtifactResult};
use crate::types::item::ItemsFile;
use crate::types::metadata::MetadataFile;

/// One session's artifact pair.
#[derive(Debug, Clone, Serialize)]
pub struct SessionArtifacts {
    pub items: ItemsFile,
    pub metadata: MetadataFile,
}

impl SessionArtifacts {
    /// Filename of the items artifact.
    pub fn items_name(&self) -> &str {
        &self.metadata.output_files.items_file
    }

    /// Filename of the metadata artifact.
    pub fn metadata_name(&self) -> &str {
        &self.metadata.output_files.metadata_file
    }
}

/// Conventional artifact names for a source and session start time.
pub fn artifact_names(source_name: &str, start: DateTime<Utc>) -> (String, String) {
    let stamp = start.format("%Y%m%d_%H%M%S");
    (
        format!("{source_name}_items_{stamp}.json"),
        format!("{source_name}_metadata_{stamp}.json"),
    )
}

/// Write both artifacts into a directory under their conventional names.
pub async fn write_artifacts(dir: &Path, artifacts: &SessionArtifacts) -> ArtifactResult<()> {
    write_json(&dir.join(artifacts.items_name()), &artifacts.items).await?;
    write_json(&dir.join(artifacts.metadata_name()), &artifacts.metadata).await?;
    Ok(())
}

/// Serialize a value to pretty JSON on disk.
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> ArtifactResult<()> {
    let display = path.display().to_string();
    let json = serde_json::to_string_pretty(value).map_err(|source| ArtifactError::Json {
        path: display.clone(),
        source,
    })?;
    tokio::fs::write(path, json)
        .await
        .map_err(|source| ArtifactError::Io {
            path: display,
            source,
        })
}

/// Load an artifact pair back from disk.
pub async fn load_artifacts(
    items_path: &Path,
    metadata_path: &Path,
) -> ArtifactResult<(ItemsFile, MetadataFile)> {
    let items: ItemsFile = read_json(items_path).await?;
    let metadata: MetadataFile = read_json(metadata_path).await?;
    Ok((items, metadata))
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> ArtifactResult<T> {
    let display = path.display().to_string();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ArtifactError::Io {
            path: display.clone(),
            source,
        })?;
    serde_json::from_str(&text).map_err(|source| ArtifactError::Json {
        path: display,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_artifact_names_match_convention() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let (items, metadata) = artifact_names("shop_example_com", start);

        assert_eq!(items, "shop_example_com_items_20250301_120000.json");
        assert_eq!(metadata, "shop_example_com_metadata_20250301_120000.json");

        let pattern = regex::Regex::new(r"^.+_items_\d{8}_\d{6}\.json$").unwrap();
        assert!(pattern.is_match(&items));
    }
}
