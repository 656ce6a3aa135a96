use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::AnimeNowError;

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub enime: EnimeConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnimeConfig {
    pub base_url: String,
    pub per_page: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber` env-filter directive, e.g. `animenow=debug`.
    pub filter: String,
}

impl AppConfig {
    /// Load config: the user file if it exists, otherwise built-in defaults.
    pub fn load() -> Result<Self, AnimeNowError> {
        let user_path = Self::config_path();
        if user_path.exists() {
            Self::load_from(&user_path)
        } else {
            Self::from_toml(DEFAULT_CONFIG)
        }
    }

    /// Load config from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, AnimeNowError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| AnimeNowError::Config(e.to_string()))?;
        Self::from_toml(&content)
    }

    fn from_toml(content: &str) -> Result<Self, AnimeNowError> {
        toml::from_str(content).map_err(|e| AnimeNowError::Config(e.to_string()))
    }

    /// Save current config to the user config file.
    pub fn save(&self) -> Result<(), AnimeNowError> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AnimeNowError::Config(e.to_string()))?;
        std::fs::write(&path, content)?;
        tracing::debug!(path = %path.display(), "config saved");
        Ok(())
    }

    /// Path to user config file (XDG on Linux, AppData on Windows).
    pub fn config_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "animenow")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("built-in default config is valid TOML")
    }
}
