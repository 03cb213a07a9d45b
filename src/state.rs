use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::Config;

const STATE_DIR: &str = ".reactivate";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not find home directory")]
    HomeDirNotFound,

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Get the state directory (~/.reactivate)
pub fn state_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeDirNotFound)?;
    Ok(home.join(STATE_DIR))
}

/// Get the canonical config file path (~/.reactivate/config.json)
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(state_dir()?.join("config.json"))
}

/// Load configuration from ~/.reactivate/config.json
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_at(&config_path()?)
}

/// Load configuration from `path`. A missing file means all defaults.
pub fn load_config_at(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        log::debug!("No config at {}; using defaults", path.display());
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    save_config_at(&config_path()?, config)
}

/// Write `config` as pretty JSON, creating the parent directory.
pub fn save_config_at(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
    }

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| write_err(std::io::Error::other(e)))?;
    fs::write(path, content).map_err(write_err)
}

/// Concrete file locations, with unset config paths filled in under
/// `~/.reactivate/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub db: PathBuf,
    pub archive: PathBuf,
    pub staging: PathBuf,
    pub outbox: PathBuf,
    pub template: Option<PathBuf>,
}

impl DataPaths {
    pub fn resolve(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::resolve_in(config, &state_dir()?))
    }

    pub fn resolve_in(config: &Config, base: &Path) -> Self {
        let pick = |configured: &Option<PathBuf>, default: &str| {
            configured.clone().unwrap_or_else(|| base.join(default))
        };
        Self {
            db: pick(&config.db_path, "clients.db"),
            archive: pick(&config.archive_path, "fully_contacted_clients.db"),
            staging: pick(&config.staging_path, "bulk_client_staging.txt"),
            outbox: pick(&config.outbox_path, "outbox.ndjson"),
            template: config.template_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_at(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.removal_threshold, 1);
        assert_eq!(config.reminder_offset_days, 30);
    }

    #[test]
    fn test_malformed_config_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_config_at(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            removal_threshold: 3,
            staging_path: Some(PathBuf::from("/tmp/staging.txt")),
            ..Config::default()
        };
        save_config_at(&path, &config).unwrap();

        let loaded = load_config_at(&path).unwrap();
        assert_eq!(loaded.removal_threshold, 3);
        assert_eq!(loaded.staging_path, config.staging_path);
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"removalThreshold\": 3"));
    }

    #[test]
    fn test_paths_default_under_base() {
        let base = Path::new("/home/dana/.reactivate");
        let config = Config {
            db_path: Some(PathBuf::from("/srv/clients.db")),
            ..Config::default()
        };
        let paths = DataPaths::resolve_in(&config, base);
        assert_eq!(paths.db, PathBuf::from("/srv/clients.db"));
        assert_eq!(paths.archive, base.join("fully_contacted_clients.db"));
        assert_eq!(paths.staging, base.join("bulk_client_staging.txt"));
        assert_eq!(paths.outbox, base.join("outbox.ndjson"));
        assert!(paths.template.is_none());
    }
}
