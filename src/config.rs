// Daemon configuration

use crate::service::Backoff;
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const CONFIG_DIR: &str = "carstore";
const CONFIG_FILE: &str = "carstore.yml";

/// Paths and timings of the daemon. Every field has a default, so a config
/// file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Inventory file; a `.jsonl` extension selects the JSON lines format
    pub data_file: PathBuf,
    pub command_file: PathBuf,
    pub result_file: PathBuf,
    pub idle_backoff_ms: u64,
    pub error_backoff_ms: u64,
    pub processed_backoff_ms: u64,
    /// Wake on command file changes rather than sleeping out idle waits
    pub watch: bool,
    /// Populate a missing inventory file with the default fleet
    pub seed_on_first_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("cars_data.txt"),
            command_file: PathBuf::from("command.json"),
            result_file: PathBuf::from("result.json"),
            idle_backoff_ms: 500,
            error_backoff_ms: 1000,
            processed_backoff_ms: 100,
            watch: true,
            seed_on_first_run: true,
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the user config directory
    /// is tried and the defaults are used if nothing is there.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(eyre!("Config file not found: {}", path.display()));
            }
            return Self::from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// `<config dir>/carstore/carstore.yml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config =
            serde_yaml::from_str(&content).with_context(|| format!("Failed to parse config {}", path.display()))?;
        debug!(path = ?path, "Loaded config");
        Ok(config)
    }

    pub fn backoff(&self) -> Backoff {
        Backoff {
            idle: Duration::from_millis(self.idle_backoff_ms),
            error: Duration::from_millis(self.error_backoff_ms),
            processed: Duration::from_millis(self.processed_backoff_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_fixed_paths() {
        let config = Config::default();
        assert_eq!(config.data_file, PathBuf::from("cars_data.txt"));
        assert_eq!(config.command_file, PathBuf::from("command.json"));
        assert_eq!(config.result_file, PathBuf::from("result.json"));
        assert_eq!(config.backoff(), Backoff::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("carstore.yml");
        fs::write(&path, "data_file: /srv/fleet.jsonl\nidle_backoff_ms: 50\nwatch: false\n").unwrap();

        let config = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(config.data_file, PathBuf::from("/srv/fleet.jsonl"));
        assert_eq!(config.backoff().idle, Duration::from_millis(50));
        assert!(!config.watch);
        assert_eq!(config.command_file, PathBuf::from("command.json"));
        assert_eq!(config.error_backoff_ms, 1000);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let temp = TempDir::new().unwrap();
        assert!(Config::load(Some(temp.path().join("nope.yml").as_path())).is_err());
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.yml");
        fs::write(&path, "idle_backoff_ms: [not a number").unwrap();
        assert!(Config::load(Some(path.as_path())).is_err());
    }
}
