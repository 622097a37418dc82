/*!
 * Sync run configuration.
 *
 * Loading, validating and saving the settings for one sync run: the primary
 * repository, the branch syncs are allowed on, the operations cache
 * location, foreign repository roots and an optional content file
 * allowlist.
 */

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Configuration for one sync run
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Name of the primary repository
    pub repository_name: String,

    /// Branch syncs are allowed to run on
    #[serde(default = "default_expected_branch")]
    pub expected_branch: String,

    /// Directory holding cached operation sets
    #[serde(default = "default_ops_cache_dir")]
    pub ops_cache_dir: PathBuf,

    /// Root directories of the foreign repositories to sync
    #[serde(default)]
    pub foreign_repository_roots: Vec<PathBuf>,

    /// Restrict derivation to these content files; empty means all
    #[serde(default)]
    pub file_list: Vec<String>,

    /// Log verbosity
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Corresponding `log` filter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_expected_branch() -> String {
    "master".to_string()
}

fn default_ops_cache_dir() -> PathBuf {
    PathBuf::from("st-ops-cache")
}

impl Config {
    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration to a JSON file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("failed to write config {}", path.display()))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.repository_name.is_empty() {
            return Err(anyhow!("repository_name must not be empty"));
        }
        if self.expected_branch.is_empty() {
            return Err(anyhow!("expected_branch must not be empty"));
        }
        Ok(())
    }

    /// File allowlist in the form the repository aggregator takes
    pub fn file_list(&self) -> Option<&[String]> {
        if self.file_list.is_empty() {
            None
        } else {
            Some(&self.file_list)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            repository_name: String::new(),
            expected_branch: default_expected_branch(),
            ops_cache_dir: default_ops_cache_dir(),
            foreign_repository_roots: Vec::new(),
            file_list: Vec::new(),
            log_level: LogLevel::default(),
        }
    }
}
