//! Process discovery by identity token.
//!
//! Services are found by matching a token against process command lines:
//! a capability behind [`ProcessRegistry`] with a local `/proc` scan and a
//! remote `pgrep` implementation, so callers depend only on the interface.

use crate::error::{Error, Result};
use crate::exec::CommandRunner;
use async_trait::async_trait;
use nix::sys::signal;
use nix::unistd::Pid;
use std::path::Path;
use std::sync::Arc;

/// Finds a running service process by its identity token.
#[async_trait]
pub trait ProcessRegistry: Send + Sync {
    /// Returns the pid of the first process whose command line contains
    /// `token`, or `None` if no such process exists.
    async fn find(&self, token: &str) -> Result<Option<u32>>;
}

/// Local implementation scanning `/proc/<pid>/cmdline`.
pub struct ProcRegistry;

#[async_trait]
impl ProcessRegistry for ProcRegistry {
    async fn find(&self, token: &str) -> Result<Option<u32>> {
        let own_pid = std::process::id();
        let entries = std::fs::read_dir("/proc")
            .map_err(|e| Error::Process(format!("cannot read /proc: {}", e)))?;

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(pid) = name.to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            // Never match our own command line (it carries the token as an
            // argument when e.g. `stackctl stop_node --host` re-invokes us).
            if pid == own_pid {
                continue;
            }

            // Processes may vanish mid-scan; unreadable entries are skipped.
            let Ok(raw) = std::fs::read(entry.path().join("cmdline")) else {
                continue;
            };
            let cmdline: String = raw
                .split(|b| *b == 0)
                .map(|part| String::from_utf8_lossy(part))
                .collect::<Vec<_>>()
                .join(" ");

            if cmdline.contains(token) {
                return Ok(Some(pid));
            }
        }

        Ok(None)
    }
}

/// Remote implementation querying over the execution channel.
pub struct RemoteProcRegistry {
    runner: Arc<dyn CommandRunner>,
}

impl RemoteProcRegistry {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl ProcessRegistry for RemoteProcRegistry {
    async fn find(&self, token: &str) -> Result<Option<u32>> {
        // pgrep exits 1 on "no match", which is a result, not a failure.
        let output = self
            .runner
            .run(&format!("pgrep -f -- {}", shell_escape::escape(token.into())))
            .await?;
        if !output.success() {
            return Ok(None);
        }
        Ok(output
            .stdout
            .lines()
            .find_map(|line| line.trim().parse::<u32>().ok()))
    }
}

/// Check whether a pid refers to a live process (signal 0).
pub fn pid_alive(pid: u32) -> bool {
    if pid == 0 || pid > i32::MAX as u32 {
        return false;
    }
    signal::kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Read a pid from a pid file, tolerating a missing file or garbage
/// contents. A recorded pid whose process is gone returns `None`.
pub fn read_live_pid_file(path: &Path) -> Option<u32> {
    let contents = std::fs::read_to_string(path).ok()?;
    let pid = contents.trim().parse::<u32>().ok()?;
    pid_alive(pid).then_some(pid)
}
