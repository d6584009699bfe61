//! Management node upgrade and rollback state machines.
//!
//! Both machines walk `Idle → BackingUp → Stopping → Replacing → Restoring
//! → Verifying → Done`; any step failure halts in `Failed` and the error
//! carries the retained backup directory so the operator can recover by
//! hand. Nothing here ever rolls back automatically, and the node is not
//! restarted after either operation; starting it again is the operator's
//! explicit decision.

use crate::backup::{BackupManager, BackupRecord};
use crate::context::CtlContext;
use crate::error::{Error, Result};
use crate::exec::{ensure_tool, run_checked, CommandRunner};
use crate::service::ServiceController;
use shell_escape::escape;
use std::path::PathBuf;
use std::sync::Arc;

/// Where the machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradePhase {
    Idle,
    BackingUp,
    Stopping,
    Replacing,
    Restoring,
    Verifying,
    Done,
    Failed,
}

impl UpgradePhase {
    pub fn step_name(self) -> &'static str {
        match self {
            UpgradePhase::Idle => "idle",
            UpgradePhase::BackingUp => "backing-up",
            UpgradePhase::Stopping => "stopping",
            UpgradePhase::Replacing => "replacing",
            UpgradePhase::Restoring => "restoring",
            UpgradePhase::Verifying => "verifying",
            UpgradePhase::Done => "done",
            UpgradePhase::Failed => "failed",
        }
    }
}

/// Shared engine behind upgrade and rollback: snapshot, stop, swap the
/// artifact, reapply configuration, reinstall tools.
struct ArtifactSwap {
    operation: &'static str,
    ctx: CtlContext,
    runner: Arc<dyn CommandRunner>,
    controller: ServiceController,
    backup: BackupManager,
    archive: PathBuf,
    /// Property file to reapply in the Restoring step. `None` means "the
    /// one saved by the BackingUp step".
    property_override: Option<PathBuf>,
    phase: UpgradePhase,
}

impl ArtifactSwap {
    fn fail(&mut self, record: Option<&BackupRecord>, source: Error) -> Error {
        let phase = self.phase;
        self.phase = UpgradePhase::Failed;
        Error::UpgradeFailed {
            operation: self.operation,
            phase: phase.step_name(),
            backup_dir: record.map(|r| r.root.clone()),
            source: Box::new(source),
        }
    }

    fn enter(&mut self, phase: UpgradePhase) {
        self.phase = phase;
        tracing::info!("{} step: {}", self.operation, phase.step_name());
    }

    async fn run(&mut self) -> Result<BackupRecord> {
        if !self.archive.is_file() {
            return Err(Error::Config(format!(
                "{} not found",
                self.archive.display()
            )));
        }
        if let Some(ref property_file) = self.property_override {
            if !property_file.is_file() {
                return Err(Error::Config(format!(
                    "{} not found",
                    property_file.display()
                )));
            }
        }
        ensure_tool(self.runner.as_ref(), "unzip").await?;

        self.enter(UpgradePhase::BackingUp);
        let record = match self.backup.snapshot() {
            Ok(record) => record,
            Err(e) => return Err(self.fail(None, e)),
        };

        self.enter(UpgradePhase::Stopping);
        if let Err(e) = self.controller.stop(false).await {
            return Err(self.fail(Some(&record), e));
        }

        self.enter(UpgradePhase::Replacing);
        if let Err(e) = self.replace_artifact().await {
            return Err(self.fail(Some(&record), e));
        }

        self.enter(UpgradePhase::Restoring);
        if let Err(e) = self.restore_configuration(&record) {
            return Err(self.fail(Some(&record), e));
        }

        self.enter(UpgradePhase::Verifying);
        if let Err(e) = self.install_supporting_tools().await {
            return Err(self.fail(Some(&record), e));
        }

        self.phase = UpgradePhase::Done;
        Ok(record)
    }

    /// Remove the old artifact tree and unpack the new archive in its
    /// place. Destructive, so only reached after the snapshot succeeded.
    async fn replace_artifact(&self) -> Result<()> {
        let home = escape(self.ctx.home().to_string_lossy());
        run_checked(self.runner.as_ref(), &format!("rm -rf {}", home)).await?;
        run_checked(
            self.runner.as_ref(),
            &format!(
                "unzip -q {} -d {}",
                escape(self.archive.to_string_lossy()),
                home
            ),
        )
        .await?;
        Ok(())
    }

    /// The archive does not ship configuration; put the saved (or
    /// operator-supplied) property file back onto the fresh artifact.
    fn restore_configuration(&self, record: &BackupRecord) -> Result<()> {
        let source = self
            .property_override
            .as_deref()
            .unwrap_or(&record.config_snapshot);
        let dest = self.ctx.properties_path();
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(source, dest).map_err(|e| {
            Error::Config(format!(
                "cannot restore {} to {}: {}",
                source.display(),
                dest.display(),
                e
            ))
        })?;
        tracing::info!("restored configuration from {}", source.display());
        Ok(())
    }

    /// Re-run the supporting-tool installer shipped inside the new
    /// artifact. The node itself is not restarted.
    async fn install_supporting_tools(&self) -> Result<()> {
        let script = self.ctx.tool_install_script();
        if !script.is_file() {
            return Err(Error::Config(format!(
                "cannot find {}; the archive does not look like a management node artifact",
                script.display()
            )));
        }
        for tool in ["cli", "ctl"] {
            run_checked(
                self.runner.as_ref(),
                &format!("bash {} {}", escape(script.to_string_lossy()), tool),
            )
            .await?;
        }
        Ok(())
    }
}

/// Replaces the management node artifact with a new version.
pub struct UpgradeOrchestrator {
    inner: ArtifactSwap,
}

impl UpgradeOrchestrator {
    pub fn new(
        ctx: CtlContext,
        runner: Arc<dyn CommandRunner>,
        controller: ServiceController,
        archive: PathBuf,
    ) -> Self {
        let backup = BackupManager::new(
            ctx.upgrade_backup_root(),
            ctx.properties_path().to_path_buf(),
            ctx.home().to_path_buf(),
        );
        Self {
            inner: ArtifactSwap {
                operation: "upgrade",
                ctx,
                runner,
                controller,
                backup,
                archive,
                property_override: None,
                phase: UpgradePhase::Idle,
            },
        }
    }

    pub fn phase(&self) -> UpgradePhase {
        self.inner.phase
    }

    /// Run the machine to completion. Returns the pre-upgrade snapshot so
    /// the caller can tell the operator where it lives.
    pub async fn run(&mut self) -> Result<BackupRecord> {
        self.inner.run().await
    }
}

/// Restores a previous artifact version after a failed upgrade.
///
/// Mirror of the upgrade machine without any heartbeat verification: the
/// state backed up here is the *current* (post-failed-upgrade) state, kept
/// so even a rollback can be undone by hand.
pub struct RollbackOrchestrator {
    inner: ArtifactSwap,
}

impl RollbackOrchestrator {
    pub fn new(
        ctx: CtlContext,
        runner: Arc<dyn CommandRunner>,
        controller: ServiceController,
        archive: PathBuf,
        property_override: Option<PathBuf>,
    ) -> Self {
        let backup = BackupManager::new(
            ctx.rollback_backup_root(),
            ctx.properties_path().to_path_buf(),
            ctx.home().to_path_buf(),
        );
        Self {
            inner: ArtifactSwap {
                operation: "rollback",
                ctx,
                runner,
                controller,
                backup,
                archive,
                property_override,
                phase: UpgradePhase::Idle,
            },
        }
    }

    pub fn phase(&self) -> UpgradePhase {
        self.inner.phase
    }

    pub async fn run(&mut self) -> Result<BackupRecord> {
        self.inner.run().await
    }
}
