//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [store]      # execution-input instance database
//! [wait]       # wait/resume timing and retries
//! [logging]    # log file location and format
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Application name used for data and config directories.
pub const APP_NAME: &str = "tollgate";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TollgateConfig {
    /// Instance store configuration.
    pub store: Option<StoreConfig>,

    /// Wait/resume configuration.
    pub wait: Option<WaitSection>,

    /// Logging configuration.
    pub logging: Option<LoggingConfig>,
}

impl TollgateConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: TollgateConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: TollgateConfig) {
        if other.store.is_some() {
            self.store = other.store;
        }
        if other.wait.is_some() {
            self.wait = other.wait;
        }
        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Wait settings, falling back to defaults when the section is absent.
    pub fn wait_or_default(&self) -> WaitSection {
        self.wait.clone().unwrap_or_default()
    }

    /// Database path, falling back to the platform data directory.
    pub fn database_path(&self) -> PathBuf {
        self.store
            .as_ref()
            .and_then(|s| s.database.clone())
            .unwrap_or_else(default_database_path)
    }

    fn validate(&self) -> Result<()> {
        if let Some(wait) = &self.wait {
            if wait.default_timeout_secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "wait.default_timeout_secs".to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
            if wait.resume_concurrency == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "wait.resume_concurrency".to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Execution-input instance store.
///
/// ```toml
/// [store]
/// database = "/var/lib/tollgate/inputs.db"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite database. Defaults to the platform data directory.
    pub database: Option<PathBuf>,
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("inputs.db")
}

// ─────────────────────────────────────────────────────────────────────────────
// Wait Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Timing and retry policy for waiting on execution input.
///
/// ```toml
/// [wait]
/// default_timeout_secs = 86400
/// max_retries = 3
/// retry_backoff_ms = 200
/// resume_concurrency = 16
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitSection {
    /// Timeout applied when a node does not declare its own (default: one day).
    pub default_timeout_secs: u64,
    /// Attempts for each engine call made while resuming or expiring a node.
    pub max_retries: u32,
    /// Linear backoff step between attempts, in milliseconds.
    pub retry_backoff_ms: u64,
    /// Maximum number of resumptions running at once.
    pub resume_concurrency: usize,
}

impl Default for WaitSection {
    fn default() -> Self {
        Self {
            default_timeout_secs: 86_400,
            max_retries: 3,
            retry_backoff_ms: 200,
            resume_concurrency: 16,
        }
    }
}

impl WaitSection {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for rolling log files. Defaults to `<config dir>/logs`.
    pub directory: Option<PathBuf>,
    /// Whether the file log is written as JSON lines.
    pub json: bool,
    /// Console filter directive (e.g. `tollgate=debug,info`).
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            json: true,
            filter: None,
        }
    }
}
