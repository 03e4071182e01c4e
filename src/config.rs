//! Configuration, loaded from a JSON file.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "tix.json";
pub const DEFAULT_DATABASE_FILE: &str = "tix.db";

/// Configuration error
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl ConfigError {
    pub fn new(message: String) -> Self {
        Self { message }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TixConfig {
    /// SQLite database holding the tickets
    pub database_file: PathBuf,
    /// Where the interactive prompt keeps its history; none if unset
    pub history_file: Option<PathBuf>,
}

impl Default for TixConfig {
    fn default() -> Self {
        Self {
            database_file: PathBuf::from(DEFAULT_DATABASE_FILE),
            history_file: None,
        }
    }
}

impl TixConfig {
    /// Loads the configuration from a JSON file. Missing keys take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(ConfigError::new(format!(
                "config file does not exist: {}",
                path_ref.display()
            )));
        }

        let content = fs::read_to_string(path_ref).map_err(|e| {
            ConfigError::new(format!("cannot read config file {}: {}", path_ref.display(), e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            ConfigError::new(format!("cannot parse config file {}: {}", path_ref.display(), e))
        })
    }

    /// Like [`TixConfig::from_json_file`], but a missing file falls back to
    /// the defaults. An unreadable or invalid file is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        if !path_ref.exists() {
            warn!(
                "config file {} not found, using defaults",
                path_ref.display()
            );
            return Ok(Self::default());
        }
        Self::from_json_file(path_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_valid_json_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
                "database_file": "/var/lib/tix/tickets.db",
                "history_file": "/home/me/.tix_history"
            }}"#
        )
        .unwrap();

        let config = TixConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.database_file, PathBuf::from("/var/lib/tix/tickets.db"));
        assert_eq!(config.history_file, Some(PathBuf::from("/home/me/.tix_history")));
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{}}").unwrap();

        let config = TixConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config, TixConfig::default());
    }

    #[test]
    fn test_invalid_json_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "invalid json").unwrap();

        assert!(TixConfig::from_json_file(file.path()).is_err());
        assert!(TixConfig::load_or_default(file.path()).is_err());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"database": "x.db"}}"#).unwrap();

        let err = TixConfig::from_json_file(file.path()).unwrap_err();
        assert!(err.message.contains("database"), "{}", err);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tix.json");

        assert!(TixConfig::from_json_file(&path).is_err());
        assert_eq!(TixConfig::load_or_default(&path).unwrap(), TixConfig::default());
    }
}
