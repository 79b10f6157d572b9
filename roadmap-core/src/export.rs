//! Snapshot export to JSON or YAML

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::models::ProjectSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Yaml,
}

impl ExportFormat {
    /// Guesses the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "yaml" | "yml" => Some(ExportFormat::Yaml),
            _ => None,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Yaml => write!(f, "yaml"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "yaml" | "yml" => Ok(ExportFormat::Yaml),
            other => Err(Error::invalid(format!("unknown export format '{}'", other))),
        }
    }
}

/// Renders a snapshot in the given format
pub fn render_snapshot(snapshot: &ProjectSnapshot, format: ExportFormat) -> Result<String> {
    let text = match format {
        ExportFormat::Json => serde_json::to_string_pretty(snapshot)?,
        ExportFormat::Yaml => serde_yaml::to_string(snapshot)?,
    };
    Ok(text)
}

/// Writes a snapshot to `path`, creating parent directories
pub fn write_snapshot(snapshot: &ProjectSnapshot, path: &Path, format: ExportFormat) -> Result<()> {
    let text = render_snapshot(snapshot, format)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, text)?;

    tracing::info!(
        path = %path.display(),
        %format,
        tracks = snapshot.tracks.len(),
        tasks = snapshot.tasks.len(),
        "exported project snapshot"
    );
    Ok(())
}

/// Reads back a snapshot written by [`write_snapshot`]
pub fn read_snapshot(path: &Path) -> Result<ProjectSnapshot> {
    let content = fs::read_to_string(path)?;
    let format = ExportFormat::from_path(path).unwrap_or(ExportFormat::Yaml);
    let snapshot = match format {
        ExportFormat::Json => serde_json::from_str(&content)?,
        ExportFormat::Yaml => serde_yaml::from_str(&content)?,
    };
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Track, TrackStatus};
    use chrono::Utc;
    use tempfile::TempDir;

    fn snapshot() -> ProjectSnapshot {
        let now = Utc::now();
        ProjectSnapshot {
            project_code: "ACME".into(),
            exported_at: now,
            roadmaps: vec![],
            tracks: vec![Track {
                id: "ACME-track-2".into(),
                roadmap_id: "main".into(),
                title: "Storage".into(),
                description: String::new(),
                status: TrackStatus::InProgress,
                rank: 10,
                dependencies: vec!["ACME-track-1".into()],
                created_at: now,
                updated_at: now,
            }],
            tasks: vec![],
            iterations: vec![],
            acceptance_criteria: vec![],
            adrs: vec![],
            documents: vec![],
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("yml".parse::<ExportFormat>().unwrap(), ExportFormat::Yaml);
        assert!("toml".parse::<ExportFormat>().is_err());
        assert_eq!(
            ExportFormat::from_path(Path::new("out/project.yaml")),
            Some(ExportFormat::Yaml)
        );
        assert_eq!(ExportFormat::from_path(Path::new("project")), None);
    }

    #[test]
    fn test_json_uses_kebab_case_status() {
        let json = render_snapshot(&snapshot(), ExportFormat::Json).unwrap();
        assert!(json.contains("\"status\": \"in-progress\""));
        assert!(json.contains("ACME-track-1"));
    }

    #[test]
    fn test_write_and_read_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("export").join("acme.yaml");
        let original = snapshot();
        write_snapshot(&original, &path, ExportFormat::Yaml).unwrap();

        let back = read_snapshot(&path).unwrap();
        assert_eq!(back.project_code, "ACME");
        assert_eq!(back.tracks[0].id, original.tracks[0].id);
        assert_eq!(back.tracks[0].status, TrackStatus::InProgress);
        assert_eq!(back.tracks[0].dependencies, original.tracks[0].dependencies);
    }
}
