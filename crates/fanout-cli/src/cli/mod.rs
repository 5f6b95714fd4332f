//! CLI for the fanout dispatcher.

mod commands;
mod runner;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use fanout_core::config::{self, FanoutConfig};
use std::path::PathBuf;

use commands::{run_completions, run_config, run_exec, run_man, ExecArgs};

/// Top-level CLI for fanout.
#[derive(Debug, Parser)]
#[command(name = "fanout")]
#[command(about = "fanout: run one command per target with bounded concurrency and retries", long_about = None)]
pub struct Cli {
    /// Use this config file instead of ~/.config/fanout/config.toml.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run COMMAND once per target line, `{}` in the arguments is replaced by the target.
    Exec(ExecArgs),

    /// Show the config file path and the effective configuration.
    Config,

    /// Print shell completions to stdout.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },

    /// Print the man page to stdout.
    Man,
}

fn load_config(path: Option<&PathBuf>) -> Result<(FanoutConfig, Option<PathBuf>)> {
    match path {
        Some(p) => Ok((config::load_from_path(p)?, Some(p.clone()))),
        None => Ok((config::load_or_init()?, config::config_path().ok())),
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Exec(args) => {
                let (cfg, _) = load_config(cli.config.as_ref())?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_exec(&cfg, args).await?;
            }
            CliCommand::Config => {
                let (cfg, path) = load_config(cli.config.as_ref())?;
                run_config(&cfg, path.as_deref())?;
            }
            CliCommand::Completions { shell } => run_completions(shell),
            CliCommand::Man => run_man()?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
