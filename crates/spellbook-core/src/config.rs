//! Settings: defaults, then `~/.spellbook/config.toml`, then environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fetch::DEFAULT_USER_AGENT;

pub const CACHE_DIR_ENV: &str = "SPELLBOOK_CACHE_DIR";
pub const DATASET_ENV: &str = "SPELLBOOK_DATASET";

pub const DEFAULT_BASE_URL: &str = "https://harrypotter.fandom.com";
pub const DEFAULT_LIST_URL: &str = "https://harrypotter.fandom.com/wiki/List_of_spells";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache_dir: PathBuf,
    pub dataset: PathBuf,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub base_url: String,
    pub list_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: spellbook_home().join("cache"),
            dataset: PathBuf::from("spells.json"),
            timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            list_url: DEFAULT_LIST_URL.to_string(),
        }
    }
}

impl Config {
    /// Load the user config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::from_file(&default_config_path())?;
        config.apply_env();
        Ok(config)
    }

    /// Read `path`, falling back to defaults when it does not exist.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn apply_env(&mut self) {
        if let Some(dir) = env_path(CACHE_DIR_ENV) {
            self.cache_dir = dir;
        }
        if let Some(dataset) = env_path(DATASET_ENV) {
            self.dataset = dataset;
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn spellbook_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".spellbook")
}

pub fn default_config_path() -> PathBuf {
    spellbook_home().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_file(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "cache_dir = \"/tmp/spells\"\ntimeout_secs = 3\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/spells"));
        assert_eq!(config.timeout_secs, 3);
        assert_eq!(config.list_url, DEFAULT_LIST_URL);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "timeout_secs = \"soon\"").unwrap();
        let err = Config::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config"));
    }

    #[test]
    #[serial]
    fn test_env_overrides_paths() {
        // SAFETY: serialized with other env-touching tests.
        unsafe {
            std::env::set_var(CACHE_DIR_ENV, "/tmp/spell-cache");
            std::env::set_var(DATASET_ENV, "");
        }
        let mut config = Config::default();
        config.apply_env();
        unsafe {
            std::env::remove_var(CACHE_DIR_ENV);
            std::env::remove_var(DATASET_ENV);
        }

        assert_eq!(config.cache_dir, PathBuf::from("/tmp/spell-cache"));
        assert_eq!(config.dataset, PathBuf::from("spells.json"));
    }
}
