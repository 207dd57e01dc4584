//! CLI configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use wirepeek_common::constants::MESSAGE_BUFFER_CAPACITY;

/// Get the configuration directory path
pub fn config_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wirepeek")
    }

    #[cfg(not(target_os = "windows"))]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".wirepeek")
    }
}

/// Get the config file path
pub fn config_file() -> PathBuf {
    config_dir().join("config.yml")
}

/// Get the ignored path globs file
pub fn ignored_paths_file() -> PathBuf {
    config_dir().join("ignored-paths.json")
}

/// Log file used while the TUI owns the terminal
pub fn log_file() -> PathBuf {
    config_dir().join("wirepeek.log")
}

/// Ensure the config directory exists
pub fn ensure_dirs() -> Result<()> {
    fs::create_dir_all(config_dir()).context("Failed to create config directory")?;
    Ok(())
}

/// Main configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Inspector server URL (default: http://localhost:3000)
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Snap selections to the enclosing quoted string
    #[serde(default = "default_auto_snap")]
    pub auto_snap: bool,

    /// Entries kept in memory by the viewer
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
}

fn default_server_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_auto_snap() -> bool {
    true
}

fn default_buffer_capacity() -> usize {
    MESSAGE_BUFFER_CAPACITY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            auto_snap: default_auto_snap(),
            buffer_capacity: default_buffer_capacity(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        ensure_dirs()?;
        self.save_to(&config_file())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Server URL with an optional command-line override applied
    pub fn server_url_or(&self, url: Option<String>) -> String {
        url.unwrap_or_else(|| self.server_url.clone())
            .trim_end_matches('/')
            .to_string()
    }
}

/// Persisted ignored-path globs, stored as a JSON array of strings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IgnoredPaths {
    globs: Vec<String>,
}

impl IgnoredPaths {
    pub fn load() -> Result<Self> {
        Self::load_from(&ignored_paths_file())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read ignored paths file")?;
        let paths: IgnoredPaths =
            serde_json::from_str(&content).context("Failed to parse ignored paths file")?;

        Ok(paths)
    }

    pub fn save(&self) -> Result<()> {
        ensure_dirs()?;
        self.save_to(&ignored_paths_file())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize ignored paths")?;
        fs::write(path, content).context("Failed to write ignored paths file")?;
        Ok(())
    }

    /// Add a glob; returns false if it was already present
    pub fn add(&mut self, glob: &str) -> bool {
        let glob = glob.trim();
        if glob.is_empty() || self.globs.iter().any(|g| g == glob) {
            return false;
        }
        self.globs.push(glob.to_string());
        true
    }

    /// Remove a glob; returns false if it was not present
    pub fn remove(&mut self, glob: &str) -> bool {
        let before = self.globs.len();
        self.globs.retain(|g| g != glob.trim());
        self.globs.len() != before
    }

    pub fn clear(&mut self) {
        self.globs.clear();
    }

    pub fn globs(&self) -> &[String] {
        &self.globs
    }

    pub fn is_empty(&self) -> bool {
        self.globs.is_empty()
    }
}
