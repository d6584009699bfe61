//! Command execution seam.
//!
//! Every external effect of the orchestrator (shell invocations, database
//! client calls, installer runs) goes through [`CommandRunner`]. Remote
//! execution is the same capability over a different channel, never a
//! separate code path: [`SshRunner`] implements the identical trait.

mod local;
mod script;
mod ssh;

pub use local::LocalRunner;
pub use script::RemoteScript;
pub use ssh::SshRunner;

use crate::error::{Error, Result};
use async_trait::async_trait;

/// Result of one command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Executes a shell command and returns stdout/stderr/exit code.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command, capturing output. A non-zero exit code is not an
    /// error at this level; callers decide via [`run_checked`].
    async fn run(&self, command: &str) -> Result<CommandOutput>;

    /// Run a command with inherited stdio, for long-running installer
    /// output the operator should see live. Returns the exit code.
    async fn run_streaming(&self, command: &str) -> Result<i32>;

    /// Human-readable description of the execution channel, for logs.
    fn describe(&self) -> String;
}

/// Run a command and turn a non-zero exit into [`Error::CommandFailed`]
/// carrying the full stdout/stderr for the operator.
pub async fn run_checked(runner: &dyn CommandRunner, command: &str) -> Result<CommandOutput> {
    let output = runner.run(command).await?;
    if !output.success() {
        return Err(Error::CommandFailed {
            command: command.to_string(),
            code: output.code,
            stdout: output.stdout,
            stderr: output.stderr,
        });
    }
    Ok(output)
}

/// Proactively verify an external tool exists before using it.
pub async fn ensure_tool(runner: &dyn CommandRunner, tool: &str) -> Result<()> {
    let output = runner.run(&format!("which {}", tool)).await?;
    if output.success() {
        Ok(())
    } else {
        Err(Error::ToolMissing(tool.to_string()))
    }
}
