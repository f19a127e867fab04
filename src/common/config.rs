//! Configuration schema, defaults, and layered loading.
//!
//! Precedence: defaults < config file < environment < CLI
use anyhow::{ensure, Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::planner::MAX_CHUNK_SIZE;

const MAX_CONCURRENCY: usize = 64;
const MAX_RETRY_LIMIT: u32 = 10;

pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "chunkdrop")
        .map(|p| p.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("chunkdrop.toml"))
}

/// Listener settings for the receiving server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
    pub read_only: bool,
    /// Upper bound on a single chunk request body, in bytes.
    pub body_limit: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8080,
            read_only: false,
            // Largest planned chunk plus multipart framing headroom.
            body_limit: MAX_CHUNK_SIZE + 2 * 1024 * 1024,
        }
    }
}

/// Sender-side transfer tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferSettings {
    /// Max concurrent chunk uploads per file.
    pub concurrency: usize,
    /// Attempts per chunk before the file transfer is failed.
    pub retry_limit: u32,
    /// Delay between attempts for the same chunk, in milliseconds.
    pub retry_delay_ms: u64,
    /// Per-request transport timeout, in seconds.
    pub request_timeout_secs: u64,
    /// Minimum interval between progress reports, in milliseconds.
    pub progress_interval_ms: u64,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            concurrency: 3,
            retry_limit: 3,
            retry_delay_ms: 1000,
            request_timeout_secs: 30,
            progress_interval_ms: 250,
        }
    }
}

impl TransferSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

/// Background cleanup of abandoned upload sessions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperSettings {
    /// Sweep period, in seconds.
    pub sweep_period_secs: u64,
    /// Inactivity ceiling after which a session is evicted, in seconds.
    pub inactivity_timeout_secs: u64,
}

impl Default for ReaperSettings {
    fn default() -> Self {
        Self {
            sweep_period_secs: 60,
            inactivity_timeout_secs: 600,
        }
    }
}

impl ReaperSettings {
    pub fn sweep_period(&self) -> Duration {
        Duration::from_secs(self.sweep_period_secs)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }
}

/// Fully resolved application configuration after all layers merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub transfer: TransferSettings,
    pub reaper: ReaperSettings,
}

impl AppConfig {
    /// Validates tuning bounds and rejects unsafe values.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.server.body_limit > MAX_CHUNK_SIZE,
            "Invalid config: server.body_limit must exceed the max chunk size {MAX_CHUNK_SIZE}"
        );
        ensure!(
            self.transfer.concurrency >= 1,
            "Invalid config: transfer.concurrency must be >= 1"
        );
        ensure!(
            self.transfer.concurrency <= MAX_CONCURRENCY,
            "Invalid config: transfer.concurrency must be <= {MAX_CONCURRENCY}"
        );
        ensure!(
            self.transfer.retry_limit >= 1,
            "Invalid config: transfer.retry_limit must be >= 1"
        );
        ensure!(
            self.transfer.retry_limit <= MAX_RETRY_LIMIT,
            "Invalid config: transfer.retry_limit must be <= {MAX_RETRY_LIMIT}"
        );
        ensure!(
            self.reaper.sweep_period_secs >= 1,
            "Invalid config: reaper.sweep_period_secs must be >= 1"
        );
        ensure!(
            self.reaper.inactivity_timeout_secs >= 1,
            "Invalid config: reaper.inactivity_timeout_secs must be >= 1"
        );
        Ok(())
    }
}

/// Runtime overrides collected from the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub read_only: Option<bool>,
    pub concurrency: Option<usize>,
}

/// Loads config from defaults/file/env.
pub fn load_config() -> Result<AppConfig> {
    let path = config_path();

    let config: AppConfig = Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("CHUNKDROP_").split("_"))
        .extract()
        .context("Failed to load configuration")?;

    config.validate()?;

    Ok(config)
}

/// Applies runtime overrides to a loaded config.
pub fn apply_overrides(mut config: AppConfig, overrides: &ConfigOverrides) -> AppConfig {
    if let Some(port) = overrides.port {
        config.server.port = port;
    }
    if let Some(read_only) = overrides.read_only {
        config.server.read_only = read_only;
    }
    if let Some(concurrency) = overrides.concurrency {
        config.transfer.concurrency = concurrency;
    }
    config
}
