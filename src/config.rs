//! Configuration for chordkey.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Profiles the selector keys may choose
    pub supported_profiles: Vec<u32>,

    /// File holding the last active profile
    pub profile_file: PathBuf,

    /// Maximum number of key events queued between hook and recognizer
    pub channel_capacity: usize,

    /// How often (ms) the recognizer wakes to check for shutdown
    pub dequeue_timeout_ms: u64,

    /// How long (ms) stopping waits for the recognizer to exit
    pub stop_timeout_ms: u64,

    /// Path for storing cumulative stats
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chordkey");

        Self {
            supported_profiles: vec![1, 2, 3],
            profile_file: data_dir.join("profile.txt"),
            channel_capacity: 256,
            dequeue_timeout_ms: 100,
            stop_timeout_ms: 1000,
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it does not exist.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chordkey")
            .join("config.json")
    }

    /// Path of the cumulative stats file.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("stats.json")
    }

    /// Parse a comma-separated profile list such as `"1,2,3"`.
    pub fn parse_profiles(s: &str) -> Result<Vec<u32>, ConfigError> {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| {
                p.parse::<u32>()
                    .map_err(|_| ConfigError::InvalidProfile(p.to_string()))
            })
            .collect()
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid profile id: {0:?}")]
    InvalidProfile(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.supported_profiles, vec![1, 2, 3]);
        assert_eq!(config.channel_capacity, 256);
        assert_eq!(config.dequeue_timeout_ms, 100);
        assert!(config.profile_file.ends_with("profile.txt"));
    }

    #[test]
    fn test_profile_list_parsing() {
        assert_eq!(Config::parse_profiles("1,2,3").unwrap(), vec![1, 2, 3]);
        assert_eq!(Config::parse_profiles(" 4 , 0 ").unwrap(), vec![4, 0]);
        assert!(Config::parse_profiles("").unwrap().is_empty());
        assert!(Config::parse_profiles("1,x").is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.supported_profiles, vec![1, 2, 3]);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "supported_profiles": [2, 5] }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.supported_profiles, vec![2, 5]);
        assert_eq!(config.stop_timeout_ms, 1000);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            channel_capacity: 32,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap().channel_capacity, 32);
    }
}
