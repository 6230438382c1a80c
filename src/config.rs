use anyhow::{bail, Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::report::DEFAULT_RECENT_LIMIT;
use crate::validation::{Validator, DEFAULT_MAX_DURATION_HOURS, DEFAULT_MAX_NAME_LENGTH};

/// Global configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub validation: ValidationSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Range used by `dashboard` when none is given
    #[serde(default = "default_range")]
    pub default_range: String,
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            default_range: default_range(),
            recent_limit: default_recent_limit(),
        }
    }
}

fn default_database_path() -> String {
    "~/.local/share/task-time-tracker/data.db".to_string()
}

fn default_range() -> String {
    "1w".to_string()
}

fn default_recent_limit() -> usize {
    DEFAULT_RECENT_LIMIT
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSettings {
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
    #[serde(default = "default_max_session_hours")]
    pub max_session_hours: i64,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            max_name_length: default_max_name_length(),
            max_session_hours: default_max_session_hours(),
        }
    }
}

fn default_max_name_length() -> usize {
    DEFAULT_MAX_NAME_LENGTH
}

fn default_max_session_hours() -> i64 {
    DEFAULT_MAX_DURATION_HOURS
}

/// Resolved configuration used by commands
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub database_path: PathBuf,
    pub default_range: String,
    pub recent_limit: usize,
    pub max_name_length: usize,
    pub max_session_hours: i64,
}

impl EffectiveConfig {
    pub fn load() -> Result<Self> {
        Self::from_global(load_global_config()?)
    }

    pub fn from_global(global: GlobalConfig) -> Result<Self> {
        Ok(Self {
            database_path: expand_path(&global.settings.database_path)?,
            default_range: global.settings.default_range,
            recent_limit: global.settings.recent_limit,
            max_name_length: global.validation.max_name_length,
            max_session_hours: global.validation.max_session_hours,
        })
    }

    /// Validator carrying the configured limits
    pub fn validator(&self) -> Result<Validator> {
        if self.max_session_hours <= 0 {
            bail!(
                "max_session_hours must be positive, got {}",
                self.max_session_hours
            );
        }
        let max_duration = Duration::try_hours(self.max_session_hours).with_context(|| {
            format!("max_session_hours is too large: {}", self.max_session_hours)
        })?;
        Ok(Validator::with_limits(self.max_name_length, max_duration))
    }
}

/// Get the global config directory path
pub fn global_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Could not determine config directory")?
        .join("task-time-tracker");
    Ok(config_dir)
}

/// Get the global config file path
pub fn global_config_path() -> Result<PathBuf> {
    Ok(global_config_dir()?.join("config.toml"))
}

/// Load global configuration from ~/.config/task-time-tracker/config.toml
pub fn load_global_config() -> Result<GlobalConfig> {
    let config_path = global_config_path()?;

    if !config_path.exists() {
        return Ok(GlobalConfig::default());
    }

    let content = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

    parse_config(&content)
        .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
}

pub fn parse_config(content: &str) -> Result<GlobalConfig> {
    Ok(toml::from_str(content)?)
}

/// Initialize global config directory and create default config if not exists
pub fn init_global_config() -> Result<PathBuf> {
    let config_dir = global_config_dir()?;
    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;

    let config_path = config_dir.join("config.toml");

    if !config_path.exists() {
        let default_config = GlobalConfig::default();
        let content = toml::to_string_pretty(&default_config)
            .context("Failed to serialize default config")?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
    }

    Ok(config_path)
}

/// Expand ~ and environment variables in path
pub fn expand_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path)
        .with_context(|| format!("Failed to expand path: {}", path))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
