//! Configuration module for thumbcache

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::decode::DEFAULT_MAX_DIMENSION;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the device media server
    #[serde(default = "default_device_url")]
    pub device_url: String,

    /// Byte budget of the in-memory thumbnail cache
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: usize,

    /// Timeout of a single thumbnail download in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Longest side of decoded thumbnails, in pixels
    #[serde(default = "default_max_thumbnail_dimension")]
    pub max_thumbnail_dimension: u32,

    /// Where fetched thumbnails are written
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_device_url() -> String {
    "http://192.168.42.1".to_string()
}

fn default_max_cache_size() -> usize {
    10 * 1024 * 1024
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_thumbnail_dimension() -> u32 {
    DEFAULT_MAX_DIMENSION
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("thumbnails")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_url: default_device_url(),
            max_cache_size: default_max_cache_size(),
            request_timeout_secs: default_request_timeout(),
            max_thumbnail_dimension: default_max_thumbnail_dimension(),
            output_dir: default_output_dir(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        crate::paths::config_path()
    }

    /// Load config from the default path or create default
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        Self::load_from(&path)
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Download timeout as a `Duration`
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config {
            device_url: "http://10.0.0.2:8080".to_string(),
            max_cache_size: 4096,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_cache_size = 2048\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.max_cache_size, 2048);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.device_url, default_device_url());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_cache_size = \"lots\"\n").unwrap();

        assert!(Config::load_from(&path).is_err());
    }
}
