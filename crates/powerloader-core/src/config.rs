use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::transfer::TransferOptions;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per download (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

/// Global configuration loaded from `~/.config/powerloader/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerloaderConfig {
    /// Optional retry policy; if missing, built-in defaults are used.
    pub retry: Option<RetryConfig>,
    /// Receive buffer size in bytes; bounds how much is held before it is written.
    pub chunk_size: usize,
    pub connect_timeout_secs: u64,
    /// Abort an attempt when throughput stays below this many bytes/s ...
    pub low_speed_limit: u32,
    /// ... for this many seconds.
    pub low_speed_time_secs: u64,
    /// Hard cap on the duration of one attempt.
    pub timeout_secs: u64,
    /// Optional bandwidth cap in bytes per second (None = no cap).
    pub max_bytes_per_sec: Option<u64>,
    /// fsync the partial file after every chunk.
    ///
    /// Off by default: each chunk is still written to the OS before it counts
    /// as progress, which survives a crash of this process but not a power
    /// loss. Turning it on makes every counted byte survive power loss too, at
    /// the cost of one fdatasync per chunk. The file is always synced before
    /// verification and whenever a failed download leaves it for resume.
    pub sync_each_chunk: bool,
}

impl Default for PowerloaderConfig {
    fn default() -> Self {
        Self {
            retry: None,
            chunk_size: 64 * 1024,
            connect_timeout_secs: 30,
            low_speed_limit: 1024,
            low_speed_time_secs: 60,
            timeout_secs: 3600,
            max_bytes_per_sec: None,
            sync_each_chunk: false,
        }
    }
}

impl PowerloaderConfig {
    /// Retry policy from `[retry]`, or the built-in default.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
            .as_ref()
            .map(|r| RetryPolicy {
                max_attempts: r.max_attempts.max(1),
                base_delay: Duration::from_secs_f64(r.base_delay_secs.max(0.0)),
                max_delay: Duration::from_secs(r.max_delay_secs),
            })
            .unwrap_or_default()
    }

    /// Curl settings for each transfer attempt.
    pub fn transfer_options(&self) -> TransferOptions {
        TransferOptions {
            chunk_size: self.chunk_size.max(1024),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            low_speed_limit: self.low_speed_limit,
            low_speed_time: Duration::from_secs(self.low_speed_time_secs),
            timeout: Duration::from_secs(self.timeout_secs),
            max_bytes_per_sec: self.max_bytes_per_sec,
            ..TransferOptions::default()
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("powerloader")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from an explicit file.
pub fn load_from_path(path: &Path) -> Result<PowerloaderConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let cfg: PowerloaderConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<PowerloaderConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = PowerloaderConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    load_from_path(&path)
}
