//! Child-process operation: one command invocation per target.
//!
//! Exit status decides the retry class: 0 succeeds, a configured transient code
//! or death by signal is retried, anything else is final.

use fanout_core::{FailureKind, Operation, OperationError};
use std::future::Future;
use std::io;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

const PLACEHOLDER: &str = "{}";

/// What a successful command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
}

#[derive(Debug, Clone)]
pub struct CommandOperation {
    program: String,
    args: Vec<String>,
    transient_exit_codes: Vec<i32>,
}

impl CommandOperation {
    pub fn new(program: String, args: Vec<String>, transient_exit_codes: Vec<i32>) -> Self {
        Self {
            program,
            args,
            transient_exit_codes,
        }
    }

    /// Arguments for `target`: every `{}` replaced, or the target appended if there is none.
    pub fn args_for(&self, target: &str) -> Vec<String> {
        if self.args.iter().any(|a| a.contains(PLACEHOLDER)) {
            self.args
                .iter()
                .map(|a| a.replace(PLACEHOLDER, target))
                .collect()
        } else {
            let mut args = self.args.clone();
            args.push(target.to_string());
            args
        }
    }

    fn command_for(&self, target: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args_for(target))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Retry class for a finished process; `None` means success.
pub fn classify_exit_status(status: ExitStatus, transient_exit_codes: &[i32]) -> Option<FailureKind> {
    match status.code() {
        Some(0) => None,
        Some(code) if transient_exit_codes.contains(&code) => Some(FailureKind::Transient),
        Some(_) => Some(FailureKind::Permanent),
        // Killed by a signal.
        None => Some(FailureKind::Transient),
    }
}

/// Retry class for a command that could not be started.
pub fn classify_spawn_error(e: &io::Error) -> FailureKind {
    match e.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied | io::ErrorKind::InvalidInput => {
            FailureKind::Permanent
        }
        _ => FailureKind::Transient,
    }
}

fn last_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim()
        .to_string()
}

impl Operation<String> for CommandOperation {
    type Output = CommandOutput;

    fn perform(
        &self,
        target: &String,
    ) -> impl Future<Output = Result<CommandOutput, OperationError>> + Send {
        let mut cmd = self.command_for(target);
        let program = self.program.clone();
        let transient = self.transient_exit_codes.clone();
        async move {
            let output = cmd.output().await.map_err(|e| {
                OperationError::new(classify_spawn_error(&e), format!("spawn {}", program))
                    .with_source(e)
            })?;
            match classify_exit_status(output.status, &transient) {
                None => Ok(CommandOutput {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                }),
                Some(kind) => {
                    let stderr = last_line(&output.stderr);
                    let mut message = format!("{} exited with {}", program, output.status);
                    if !stderr.is_empty() {
                        message.push_str(": ");
                        message.push_str(&stderr);
                    }
                    Err(OperationError::new(kind, message))
                }
            }
        }
    }
}
