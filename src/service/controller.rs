use super::{DependencyEndpoint, NodeState, ServiceDescriptor};
use crate::error::{Error, Result};
use crate::exec::{run_checked, CommandRunner};
use crate::probe::{tcp_reachable, wait_until, ReadinessProbe};
use crate::process::{read_live_pid_file, ProcessRegistry};
use std::sync::Arc;
use std::time::Duration;

/// Poll interval while waiting for a stopped process to disappear.
const STOP_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long the graceful stop phase may take before escalating to SIGKILL.
const STOP_DEADLINE: Duration = Duration::from_secs(30);

/// Poll interval while waiting for readiness after start.
const READINESS_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Start/stop/status for one logical service.
///
/// No two controllers may claim the same service identity concurrently;
/// this is enforced by the tool running as a single sequential process,
/// not by locks.
pub struct ServiceController {
    descriptor: ServiceDescriptor,
    runner: Arc<dyn CommandRunner>,
    registry: Arc<dyn ProcessRegistry>,
    probe: Option<Arc<dyn ReadinessProbe>>,
    dependencies: Vec<DependencyEndpoint>,
    stop_deadline: Duration,
}

impl ServiceController {
    pub fn new(
        descriptor: ServiceDescriptor,
        runner: Arc<dyn CommandRunner>,
        registry: Arc<dyn ProcessRegistry>,
    ) -> Self {
        Self {
            descriptor,
            runner,
            registry,
            probe: None,
            dependencies: Vec::new(),
            stop_deadline: STOP_DEADLINE,
        }
    }

    /// Override the graceful-stop deadline (tests shorten it; production
    /// keeps the 30s default).
    pub fn with_stop_deadline(mut self, deadline: Duration) -> Self {
        self.stop_deadline = deadline;
        self
    }

    /// Attach a protocol-level readiness probe. Without one, status is
    /// process-presence only and start waits for the process to appear.
    pub fn with_probe(mut self, probe: Arc<dyn ReadinessProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Declare endpoints that must be reachable before start is attempted.
    pub fn with_dependencies(mut self, dependencies: Vec<DependencyEndpoint>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Locate the service process: command-line token first, pid file as
    /// fallback for processes whose cmdline got truncated.
    pub async fn find_pid(&self) -> Result<Option<u32>> {
        if let Some(pid) = self.registry.find(&self.descriptor.process_token).await? {
            return Ok(Some(pid));
        }
        if let Some(ref pid_file) = self.descriptor.pid_file {
            return Ok(read_live_pid_file(pid_file));
        }
        Ok(None)
    }

    /// Current observable state.
    ///
    /// Running requires both a live process and a passing probe; a live
    /// process with a failing probe is a zombie; a probe error yields
    /// Unknown rather than guessing.
    pub async fn status(&self) -> Result<NodeState> {
        let Some(_pid) = self.find_pid().await? else {
            return Ok(NodeState::Stopped);
        };

        let Some(ref probe) = self.probe else {
            return Ok(NodeState::Running);
        };

        match probe.check().await {
            Ok(true) => Ok(NodeState::Running),
            Ok(false) => Ok(NodeState::Zombie),
            Err(e) => {
                tracing::warn!(
                    service = %self.descriptor.name,
                    "readiness probe errored: {}",
                    e
                );
                Ok(NodeState::Unknown)
            }
        }
    }

    /// Start the service and wait for readiness.
    ///
    /// Idempotent: an already-running service is success with no side
    /// effect. Dependency endpoints are verified first and reported
    /// without attempting the start. A readiness timeout triggers a
    /// best-effort stop before the error surfaces, so a half-started
    /// service is not left behind.
    #[tracing::instrument(skip(self), fields(service = %self.descriptor.name))]
    pub async fn start(&self, readiness_timeout: Duration) -> Result<()> {
        if let Some(pid) = self.find_pid().await? {
            tracing::info!("'{}' [PID:{}] is already running", self.descriptor.name, pid);
            return Ok(());
        }

        for dep in &self.dependencies {
            if !tcp_reachable(&dep.host, dep.port).await {
                return Err(Error::Connectivity {
                    name: dep.name.clone(),
                    host: dep.host.clone(),
                    port: dep.port,
                });
            }
        }

        run_checked(self.runner.as_ref(), &self.descriptor.start_command).await?;
        tracing::info!(
            "started '{}'; waiting for it to become ready",
            self.descriptor.name
        );

        let ready = match self.probe {
            Some(ref probe) => {
                let probe = probe.clone();
                wait_until(
                    move || {
                        let probe = probe.clone();
                        async move { probe.check().await.unwrap_or(false) }
                    },
                    readiness_timeout,
                    READINESS_POLL_INTERVAL,
                )
                .await
            }
            None => {
                let this = &*self;
                wait_until(
                    move || async move { matches!(this.find_pid().await, Ok(Some(_))) },
                    readiness_timeout,
                    READINESS_POLL_INTERVAL,
                )
                .await
            }
        };

        if !ready {
            tracing::warn!(
                "'{}' failed to become ready, stopping it again",
                self.descriptor.name
            );
            if let Err(e) = self.stop(false).await {
                tracing::warn!(
                    "best-effort stop after failed start of '{}' also failed: {}",
                    self.descriptor.name,
                    e
                );
            }
            return Err(Error::StartupTimeout {
                service: self.descriptor.name.clone(),
                timeout: readiness_timeout.as_secs(),
            });
        }

        Ok(())
    }

    /// Stop the service.
    ///
    /// Idempotent: an already-stopped service is success. The graceful
    /// stop command runs first, then the controller polls for process
    /// disappearance (1s interval, 30s deadline) and escalates to SIGKILL.
    /// `force` skips the graceful phase entirely.
    #[tracing::instrument(skip(self), fields(service = %self.descriptor.name))]
    pub async fn stop(&self, force: bool) -> Result<()> {
        if self.find_pid().await?.is_none() {
            tracing::info!("'{}' is already stopped", self.descriptor.name);
            return Ok(());
        }

        if !force {
            // A failing stop script is not fatal: the kill escalation below
            // still brings the process down.
            match self.runner.run(&self.descriptor.stop_command).await {
                Ok(output) if !output.success() => {
                    tracing::warn!(
                        "stop command for '{}' exited with {}; will escalate if the process survives",
                        self.descriptor.name,
                        output.code
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "stop command for '{}' could not run: {}; will escalate",
                        self.descriptor.name,
                        e
                    );
                }
                Ok(_) => {}
            }

            let this = &*self;
            let gone = wait_until(
                move || async move { matches!(this.find_pid().await, Ok(None)) },
                self.stop_deadline,
                STOP_POLL_INTERVAL,
            )
            .await;

            if gone {
                tracing::info!("successfully stopped '{}'", self.descriptor.name);
                return Ok(());
            }

            tracing::warn!(
                "'{}' did not exit within {} seconds, killing it",
                self.descriptor.name,
                self.stop_deadline.as_secs()
            );
        }

        // Re-resolve: the pid may have changed or the process may have
        // exited between the poll and now.
        let pid = match self.find_pid().await? {
            Some(pid) => pid,
            None => return Ok(()),
        };
        run_checked(self.runner.as_ref(), &format!("kill -9 {}", pid)).await?;

        Ok(())
    }
}
