use super::{CommandOutput, CommandRunner};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

/// Runs commands through `/bin/bash -c` on the local host.
pub struct LocalRunner {
    verbose: bool,
}

impl LocalRunner {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

#[async_trait]
impl CommandRunner for LocalRunner {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        if self.verbose {
            tracing::debug!("executing shell command [{}]", command);
        }

        let output = Command::new("/bin/bash")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::Process(format!("failed to spawn '{}': {}", command, e)))?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code().unwrap_or(-1),
        };

        if self.verbose {
            tracing::debug!(
                code = result.code,
                stdout = %result.stdout.trim_end(),
                stderr = %result.stderr.trim_end(),
                "shell command finished"
            );
        }

        Ok(result)
    }

    async fn run_streaming(&self, command: &str) -> Result<i32> {
        if self.verbose {
            tracing::debug!("executing shell command with live output [{}]", command);
        }

        let status = Command::new("/bin/bash")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| Error::Process(format!("failed to spawn '{}': {}", command, e)))?;

        Ok(status.code().unwrap_or(-1))
    }

    fn describe(&self) -> String {
        "local".to_string()
    }
}
