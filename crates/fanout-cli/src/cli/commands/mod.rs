//! CLI command handlers, one per file.

mod completions;
mod config;
mod exec;

pub use completions::{run_completions, run_man};
pub use config::run_config;
pub use exec::{run_exec, ExecArgs};
