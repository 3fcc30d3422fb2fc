//! Ledger configuration loaded from TOML.
//!
//! ```toml
//! [storage]
//! backend = "sled"
//! path = "data/ledger.db"
//! seed_actors = true
//!
//! [logging]
//! level = "info"
//! json = false
//!
//! [notifications]
//! enabled = true
//! sender = "loans@ledger.example"
//! attachment_name = "agreement.txt"
//! ```
use super::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "LEDGER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "ledger.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Database directory, only read by the sled backend.
    pub path: PathBuf,
    pub seed_actors: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: PathBuf::from("data/ledger.db"),
            seed_actors: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// EnvFilter directive, `RUST_LOG` wins when set.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub sender: String,
    pub attachment_name: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sender: "loans@ledger.example".into(),
            attachment_name: "agreement.txt".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub notifications: NotificationConfig,
}

impl LedgerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Read the file named by `LEDGER_CONFIG` (default `ledger.toml`).
    ///
    /// A missing file falls back to the defaults, any other failure is returned.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let config = Self::from_file(path)?;
        info!(path = %path.display(), "loaded ledger config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.backend == StorageBackend::Sled
            && self.storage.path.as_os_str().is_empty()
        {
            return Err(ConfigError::Invalid(
                "storage.path is required for the sled backend".into(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.level must not be empty".into()));
        }
        if self.notifications.enabled && !self.notifications.sender.contains('@') {
            return Err(ConfigError::Invalid(format!(
                "notifications.sender '{}' is not an email address",
                self.notifications.sender
            )));
        }
        if self.notifications.attachment_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "notifications.attachment_name must not be empty".into(),
            ));
        }
        Ok(())
    }
}
