//! Project configuration
//!
//! Loaded from YAML, then overridden from the environment:
//!
//! ```yaml
//! project_code: ACME
//! database: /home/me/.local/share/roadmap/ACME.db
//! lock_timeout_secs: 5
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::ids::normalize_project_code;

pub const CONFIG_ENV: &str = "ROADMAP_CONFIG";
pub const PROJECT_CODE_ENV: &str = "ROADMAP_PROJECT_CODE";
pub const DATABASE_ENV: &str = "ROADMAP_DB";

const APP_DIR: &str = "roadmap";
const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Prefix of every generated ID; `PRJ` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_code: Option<String>,

    /// SQLite file; `<data_dir>/roadmap/<code>.db` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,

    /// How long to wait for another process to release the project lock
    pub lock_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_code: None,
            database: None,
            lock_timeout_secs: DEFAULT_LOCK_TIMEOUT_SECS,
        }
    }
}

/// Default config file location: `<config_dir>/roadmap/config.yaml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.yaml"))
}

impl Config {
    /// Config file this process would read: `explicit`, then
    /// `ROADMAP_CONFIG`, then [`default_config_path`]
    pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(default_config_path)
    }

    /// Loads a config file. A missing file yields the default config.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(config = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|e| {
            Error::Serialization(format!("failed to parse config {}: {}", path.display(), e))
        })
    }

    /// Loads the config from [`Config::resolve_path`] and applies the
    /// environment overrides on top.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match Self::resolve_path(explicit) {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies `ROADMAP_PROJECT_CODE` and `ROADMAP_DB` from `lookup`.
    /// Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(code) = lookup(PROJECT_CODE_ENV).filter(|v| !v.trim().is_empty()) {
            self.project_code = Some(code);
        }
        if let Some(db) = lookup(DATABASE_ENV).filter(|v| !v.trim().is_empty()) {
            self.database = Some(PathBuf::from(db));
        }
    }

    /// Normalized project code
    pub fn project_code(&self) -> Result<String> {
        normalize_project_code(self.project_code.as_deref())
    }

    /// Database path, defaulting to `<data_dir>/roadmap/<code>.db`
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir().ok_or_else(|| {
            Error::invalid(format!(
                "no data directory on this platform; set {} or `database` in the config",
                DATABASE_ENV
            ))
        })?;
        Ok(data_dir
            .join(APP_DIR)
            .join(format!("{}.db", self.project_code()?)))
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.project_code().unwrap(), "PRJ");
        assert_eq!(config.lock_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_load_partial_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "project_code: acme\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.project_code().unwrap(), "ACME");
        assert_eq!(config.lock_timeout_secs, 5);
        assert!(config.database.is_none());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sub").join("config.yaml");
        let config = Config {
            project_code: Some("OPS".into()),
            database: Some(dir.path().join("ops.db")),
            lock_timeout_secs: 2,
        };
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_yaml_is_serialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "lock_timeout_secs: [not a number\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [(PROJECT_CODE_ENV, "ops"), (DATABASE_ENV, "/tmp/ops.db")]
            .into_iter()
            .collect();
        let mut config = Config {
            project_code: Some("ACME".into()),
            ..Config::default()
        };
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.project_code().unwrap(), "OPS");
        assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/ops.db"));
    }

    #[test]
    fn test_blank_override_ignored() {
        let mut config = Config {
            project_code: Some("ACME".into()),
            ..Config::default()
        };
        config.apply_overrides(|_| Some("  ".to_string()));
        assert_eq!(config.project_code().unwrap(), "ACME");
        assert!(config.database.is_none());
    }

    #[test]
    fn test_bad_project_code() {
        let config = Config {
            project_code: Some("AC-ME".into()),
            ..Config::default()
        };
        assert_eq!(
            config.project_code().unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }
}
