//! Configuration module for syncdrift.
//!
//! Typed structs mapping to the YAML configuration file, with loading,
//! defaults, and a platform-appropriate default path.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration for the synchronization service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// Synchronization and manager settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Root directory of the primary target's mirror.
    pub root: PathBuf,
    /// Milliseconds to wait for a registered target to settle after its
    /// last change before the manager treats its batch as final.
    pub inactivity_delay_ms: u64,
    /// Maximum changes routed in a single batch before the remainder waits
    /// for the next round.
    pub max_batch_size: usize,
    /// Retries before a peer's pending entry collapses to a full resync.
    pub max_retries: u32,
    /// Milliseconds between watcher poll cycles.
    pub poll_interval_ms: u64,
    /// Milliseconds a detected change waits in the debounce queue before
    /// it is considered settled.
    pub debounce_delay_ms: u64,
    /// Milliseconds before an acquired filesystem lock auto-releases.
    pub lock_timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("SyncDrift"),
            inactivity_delay_ms: 1000,
            max_batch_size: 50,
            max_retries: 3,
            poll_interval_ms: 1000,
            debounce_delay_ms: 100,
            lock_timeout_ms: 30_000,
        }
    }
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Path to the log file.
    pub file: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("syncdrift");
        Self {
            level: "info".to_string(),
            file: data_dir.join("syncdrift.log"),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/syncdrift/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("syncdrift")
            .join("config.yaml")
    }
}
