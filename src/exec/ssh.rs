use super::{CommandOutput, CommandRunner, RemoteScript};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const SSH_OPTIONS: [&str; 4] = [
    "-o",
    "UserKnownHostsFile=/dev/null",
    "-o",
    "StrictHostKeyChecking=no",
];

/// Runs commands on a remote host over ssh.
///
/// The command is wrapped into a [`RemoteScript`] and fed to a remote
/// `bash -s` over stdin, so no shell-quoting of the payload happens on the
/// local side. The host is an ssh URL such as `root@192.168.0.10`.
pub struct SshRunner {
    host: String,
    verbose: bool,
}

impl SshRunner {
    pub fn new(host: impl Into<String>, verbose: bool) -> Self {
        Self {
            host: host.into(),
            verbose,
        }
    }

    /// Execute a pre-built script on the remote host, capturing output.
    pub async fn run_script(&self, script: &RemoteScript) -> Result<CommandOutput> {
        self.exec(script, false).await
    }

    /// Execute a pre-built script with inherited stdio.
    pub async fn run_script_streaming(&self, script: &RemoteScript) -> Result<i32> {
        Ok(self.exec(script, true).await?.code)
    }

    async fn exec(&self, script: &RemoteScript, streaming: bool) -> Result<CommandOutput> {
        let rendered = script.render();
        if self.verbose {
            tracing::debug!(host = %self.host, "executing remote script:\n{}", rendered);
        }

        let mut cmd = Command::new("ssh");
        cmd.args(SSH_OPTIONS)
            .arg(&self.host)
            .arg("/bin/bash -s")
            .stdin(Stdio::piped());
        if streaming {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Process(format!("failed to spawn ssh to {}: {}", self.host, e)))?;

        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| Error::Process("ssh stdin unavailable".to_string()))?;
            stdin.write_all(rendered.as_bytes()).await?;
            // Drop closes the pipe so the remote bash sees EOF.
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::Process(format!("ssh to {} failed: {}", self.host, e)))?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code().unwrap_or(-1),
        })
    }
}

#[async_trait]
impl CommandRunner for SshRunner {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        self.run_script(&RemoteScript::new().run(command)).await
    }

    async fn run_streaming(&self, command: &str) -> Result<i32> {
        self.run_script_streaming(&RemoteScript::new().run(command))
            .await
    }

    fn describe(&self) -> String {
        format!("ssh {}", self.host)
    }
}
