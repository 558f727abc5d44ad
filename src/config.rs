//! Configuration loading and management.
//!
//! Loads triage configuration from `./config.toml` (or
//! `$CRASHTRIAGE_CONFIG_PATH`). Environment variables override file values;
//! file values override defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level triage configuration loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// Storage settings (`[storage]`).
    pub storage: StorageSettings,
    /// Ingestion limits (`[ingest]`).
    pub ingest: IngestSettings,
    /// Reconciliation sweep settings (`[sweep]`).
    pub sweep: SweepSettings,
    /// Logging settings (`[logging]`).
    pub logging: LoggingSettings,
}

/// Storage settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Path to the SQLite database file.
    pub database_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_path: "crashtriage.db".to_owned(),
        }
    }
}

/// Ingestion limits applied during the streaming parse.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Maximum accumulated bytes for the `log` element.
    pub max_log_bytes: usize,
    /// Maximum accumulated bytes for every other report field.
    pub max_field_bytes: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            max_log_bytes: 256 * 1024,
            max_field_bytes: 512,
        }
    }
}

/// Reconciliation sweep settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    /// Seconds between sweep passes when running in watch mode.
    pub interval_secs: u64,
    /// Unresolved records fetched per query while sweeping a signature.
    pub batch_size: u32,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            batch_size: 100,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default log level when `RUST_LOG` is not set.
    pub log_level: String,
    /// Directory for rotated JSON log files in watch mode.
    pub logs_dir: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            logs_dir: "logs".to_owned(),
        }
    }
}

impl TriageConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// Config file path: `$CRASHTRIAGE_CONFIG_PATH` or `./config.toml`.
    /// A missing file is not an error — defaults apply.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from the TOML file only, no env overrides.
    fn load_from_file() -> Result<Self> {
        let path = Self::config_path_with(|key| std::env::var(key).ok());
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                let config: TriageConfig =
                    toml::from_str(&contents).context("failed to parse config TOML")?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no config file found, using defaults");
                Ok(TriageConfig::default())
            }
            Err(e) => Err(anyhow::anyhow!("failed to read config file: {e}")),
        }
    }

    /// Resolve the config file path using a custom env resolver (for testing).
    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        if let Some(p) = env("CRASHTRIAGE_CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("config.toml")
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability.
    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("CRASHTRIAGE_DB_PATH") {
            self.storage.database_path = v;
        }
        if let Some(v) = env("CRASHTRIAGE_MAX_LOG_BYTES") {
            match v.parse() {
                Ok(n) => self.ingest.max_log_bytes = n,
                Err(_) => tracing::warn!(
                    var = "CRASHTRIAGE_MAX_LOG_BYTES",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("CRASHTRIAGE_SWEEP_INTERVAL_SECS") {
            match v.parse() {
                Ok(n) => self.sweep.interval_secs = n,
                Err(_) => tracing::warn!(
                    var = "CRASHTRIAGE_SWEEP_INTERVAL_SECS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("CRASHTRIAGE_SWEEP_BATCH_SIZE") {
            match v.parse() {
                Ok(n) => self.sweep.batch_size = n,
                Err(_) => tracing::warn!(
                    var = "CRASHTRIAGE_SWEEP_BATCH_SIZE",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("CRASHTRIAGE_LOG_LEVEL") {
            self.logging.log_level = v;
        }
        if let Some(v) = env("CRASHTRIAGE_LOGS_DIR") {
            self.logging.logs_dir = v;
        }
    }
}
