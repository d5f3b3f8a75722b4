use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::memory::schedule::IntervalTable;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct JiyiConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub cloud: CloudConfig,
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

/// Remote database credentials. The account is considered signed in when both
/// `account_id` and `access_token` are set.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CloudConfig {
    pub url: String,
    pub api_key: String,
    pub access_token: Option<String>,
    pub account_id: Option<String>,
    pub table: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Retention intervals in days, indexed by stage.
    pub intervals_days: Vec<u32>,
    /// Context label used when a capture doesn't supply one.
    pub default_context: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_jiyi_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            access_token: None,
            account_id: None,
            table: "memory_items".into(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            intervals_days: IntervalTable::DEFAULT_DAYS.to_vec(),
            default_context: "General".into(),
        }
    }
}

impl CloudConfig {
    /// Returns `(account_id, access_token)` when a cloud session is configured.
    pub fn session(&self) -> Option<(&str, &str)> {
        match (self.account_id.as_deref(), self.access_token.as_deref()) {
            (Some(account), Some(token))
                if !account.is_empty() && !token.is_empty() && !self.url.is_empty() =>
            {
                Some((account, token))
            }
            _ => None,
        }
    }
}

/// Returns `~/.jiyi/`, falling back to the working directory when no home
/// directory can be determined.
pub fn default_jiyi_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".jiyi")
}

/// Returns the default config file path: `~/.jiyi/config.toml`
pub fn default_config_path() -> PathBuf {
    default_jiyi_dir().join("config.toml")
}

impl JiyiConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            JiyiConfig::default()
        };

        config.apply_env_overrides();
        config.intervals().context("invalid [schedule] section")?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("JIYI_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("JIYI_LOG_LEVEL") {
            self.logging.log_level = val;
        }
        if let Ok(val) = std::env::var("JIYI_CLOUD_URL") {
            self.cloud.url = val;
        }
        if let Ok(val) = std::env::var("JIYI_CLOUD_API_KEY") {
            self.cloud.api_key = val;
        }
        if let Ok(val) = std::env::var("JIYI_ACCESS_TOKEN") {
            self.cloud.access_token = Some(val);
        }
        if let Ok(val) = std::env::var("JIYI_ACCOUNT_ID") {
            self.cloud.account_id = Some(val);
        }
    }

    /// Build the validated interval table from `[schedule] intervals_days`.
    pub fn intervals(&self) -> Result<IntervalTable> {
        Ok(IntervalTable::new(self.schedule.intervals_days.clone())?)
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
