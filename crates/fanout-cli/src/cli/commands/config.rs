//! `fanout config` – show where the config lives and what is in effect.

use anyhow::Result;
use fanout_core::config::{self, FanoutConfig};
use std::path::Path;

pub fn run_config(cfg: &FanoutConfig, path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => println!("# {}", p.display()),
        None => println!("# (no config file)"),
    }
    print!("{}", config::to_toml(cfg)?);
    let policy = cfg.retry_policy();
    println!(
        "# effective retry policy: {} retries, base {:?}, cap {}",
        policy.max_retries,
        policy.base_delay,
        policy
            .max_delay
            .map(|d| format!("{:?}", d))
            .unwrap_or_else(|| "none".to_string())
    );
    Ok(())
}
