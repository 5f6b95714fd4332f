use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::{saturating_millis, RetryPolicy};

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds; doubles per retry.
    pub base_delay_ms: u64,
    /// Ceiling on a single backoff delay in seconds (None = uncapped).
    #[serde(default)]
    pub max_delay_secs: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_retries: policy.max_retries,
            base_delay_ms: saturating_millis(policy.base_delay),
            max_delay_secs: None,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        let policy = RetryPolicy::new(cfg.max_retries, Duration::from_millis(cfg.base_delay_ms));
        match cfg.max_delay_secs {
            Some(secs) => policy.with_max_delay(Duration::from_secs(secs)),
            None => policy,
        }
    }
}

/// Global configuration loaded from `~/.config/fanout/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanoutConfig {
    /// Maximum operations in flight at once.
    pub concurrency: usize,
    /// Exit codes the command runner treats as transient (retried).
    #[serde(default = "default_transient_exit_codes")]
    pub transient_exit_codes: Vec<i32>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

/// EX_TEMPFAIL from sysexits.h.
fn default_transient_exit_codes() -> Vec<i32> {
    vec![75]
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            transient_exit_codes: default_transient_exit_codes(),
            retry: None,
        }
    }
}

impl FanoutConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
            .as_ref()
            .map(RetryPolicy::from)
            .unwrap_or_default()
    }

    /// Reject values that would make a run fail or hang.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be at least 1");
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("fanout")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<FanoutConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = FanoutConfig::default();
        let toml = to_toml(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Serialize a config the way it is written to disk.
pub fn to_toml(cfg: &FanoutConfig) -> Result<String> {
    Ok(toml::to_string_pretty(cfg)?)
}

/// Load and validate configuration from an explicit path.
pub fn load_from_path(path: &Path) -> Result<FanoutConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: FanoutConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config: {}", path.display()))?;
    Ok(cfg)
}
