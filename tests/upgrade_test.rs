//! The upgrade/rollback state machines: phase progression, failure
//! halting, backup retention and restorability. The artifact swap commands
//! run against a fake runner; file copies (snapshot, config restore) are
//! real.

use async_trait::async_trait;
use stackctl::backup::BackupManager;
use stackctl::error::{Error, Result};
use stackctl::exec::{CommandOutput, CommandRunner};
use stackctl::process::ProcessRegistry;
use stackctl::service::{ServiceController, ServiceDescriptor, ServiceKind};
use stackctl::{CtlContext, RollbackOrchestrator, UpgradeOrchestrator, UpgradePhase};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Succeeds on everything except commands containing `fail_on`.
struct FakeRunner {
    commands: Mutex<Vec<String>>,
    fail_on: Option<&'static str>,
}

impl FakeRunner {
    fn new(fail_on: Option<&'static str>) -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            fail_on,
        }
    }

    fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        self.commands.lock().unwrap().push(command.to_string());
        let failing = self.fail_on.is_some_and(|pat| command.contains(pat));
        Ok(CommandOutput {
            stdout: String::new(),
            stderr: if failing { "simulated failure".into() } else { String::new() },
            code: if failing { 1 } else { 0 },
        })
    }

    async fn run_streaming(&self, command: &str) -> Result<i32> {
        self.run(command).await.map(|o| o.code)
    }

    fn describe(&self) -> String {
        "fake".to_string()
    }
}

/// No process is ever running, so the Stopping step is a no-op.
struct EmptyRegistry;

#[async_trait]
impl ProcessRegistry for EmptyRegistry {
    async fn find(&self, _token: &str) -> Result<Option<u32>> {
        Ok(None)
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    ctx: CtlContext,
    archive: PathBuf,
}

/// A populated install home plus a new artifact archive to swap in.
fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join("management");
    fs::create_dir_all(home.join("conf")).unwrap();
    fs::create_dir_all(home.join("tools")).unwrap();
    fs::write(
        home.join("conf").join("management.properties"),
        "db.user=stack\ndb.password=\ndb.url=jdbc:mysql://localhost:3306\n",
    )
    .unwrap();
    fs::write(home.join("tools").join("install.sh"), "#!/bin/bash\n").unwrap();
    fs::write(home.join("app.jar"), b"version 1").unwrap();

    let archive = dir.path().join("management-2.0.war");
    fs::write(&archive, b"zipped new version").unwrap();

    let ctx = CtlContext::new(
        home,
        dir.path().join("data"),
        "stack".to_string(),
        false,
    );
    Fixture {
        _dir: dir,
        ctx,
        archive,
    }
}

fn stop_controller(runner: Arc<FakeRunner>) -> ServiceController {
    ServiceController::new(
        ServiceDescriptor::new(
            "management node",
            ServiceKind::AppNode,
            "true",
            "true",
            "appName=management",
        ),
        runner,
        Arc::new(EmptyRegistry),
    )
}

#[tokio::test]
async fn successful_upgrade_walks_every_phase_and_reports_the_backup() {
    let fx = fixture();
    let runner = Arc::new(FakeRunner::new(None));
    let controller = stop_controller(runner.clone());
    let mut orchestrator =
        UpgradeOrchestrator::new(fx.ctx.clone(), runner.clone(), controller, fx.archive.clone());

    assert_eq!(orchestrator.phase(), UpgradePhase::Idle);
    let record = orchestrator.run().await.unwrap();
    assert_eq!(orchestrator.phase(), UpgradePhase::Done);

    // The snapshot holds the pre-upgrade state.
    assert!(record.config_snapshot.is_file());
    assert_eq!(
        fs::read(record.artifact_snapshot.join("app.jar")).unwrap(),
        b"version 1".to_vec()
    );

    // Replace ran through the runner, tool installers re-ran, and nothing
    // restarted the node.
    let commands = runner.commands();
    assert!(commands.iter().any(|c| c.starts_with("rm -rf ")));
    assert!(commands.iter().any(|c| c.contains("unzip")));
    assert!(commands.iter().any(|c| c.contains("install.sh") && c.ends_with("cli")));
    assert!(commands.iter().any(|c| c.contains("install.sh") && c.ends_with("ctl")));
    assert!(
        !commands.iter().any(|c| c.contains("startup.sh")),
        "upgrade must never restart the node automatically"
    );
}

#[tokio::test]
async fn failure_at_replacing_halts_with_a_restorable_backup() {
    let fx = fixture();
    // "unzip -q" matches only the unpack step, not the `which unzip`
    // tool check that runs before the machine starts.
    let runner = Arc::new(FakeRunner::new(Some("unzip -q")));
    let controller = stop_controller(runner.clone());
    let mut orchestrator =
        UpgradeOrchestrator::new(fx.ctx.clone(), runner.clone(), controller, fx.archive.clone());

    let err = orchestrator.run().await.unwrap_err();
    assert_eq!(orchestrator.phase(), UpgradePhase::Failed);

    let backup_dir = match err {
        Error::UpgradeFailed {
            phase, backup_dir, ..
        } => {
            assert_eq!(phase, "replacing");
            backup_dir.expect("the backup taken in BackingUp must be reported")
        }
        other => panic!("expected UpgradeFailed, got {:?}", other),
    };

    // The backup still exists and can be restored by hand.
    assert!(backup_dir.is_dir());
    let record = BackupManager::load_record(&backup_dir).unwrap();

    fs::write(fx.ctx.home().join("app.jar"), b"half upgraded").unwrap();
    let manager = BackupManager::new(
        fx.ctx.upgrade_backup_root(),
        fx.ctx.properties_path().to_path_buf(),
        fx.ctx.home().to_path_buf(),
    );
    manager.restore(&record).unwrap();
    assert_eq!(
        fs::read(fx.ctx.home().join("app.jar")).unwrap(),
        b"version 1".to_vec()
    );
}

#[tokio::test]
async fn missing_archive_fails_before_any_mutation() {
    let fx = fixture();
    let runner = Arc::new(FakeRunner::new(None));
    let controller = stop_controller(runner.clone());
    let mut orchestrator = UpgradeOrchestrator::new(
        fx.ctx.clone(),
        runner.clone(),
        controller,
        fx.ctx.home().join("no-such.war"),
    );

    let err = orchestrator.run().await.unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert_eq!(orchestrator.phase(), UpgradePhase::Idle);
    assert!(runner.commands().is_empty());
}

#[tokio::test]
async fn upgrade_restores_the_saved_configuration() {
    let fx = fixture();
    let runner = Arc::new(FakeRunner::new(None));
    let controller = stop_controller(runner.clone());
    let mut orchestrator =
        UpgradeOrchestrator::new(fx.ctx.clone(), runner, controller, fx.archive.clone());

    orchestrator.run().await.unwrap();

    // The property file carries the pre-upgrade contents (the new archive
    // ships none).
    let restored = fs::read_to_string(fx.ctx.properties_path()).unwrap();
    assert!(restored.contains("db.user=stack"));
}

#[tokio::test]
async fn rollback_applies_the_supplied_property_file() {
    let fx = fixture();
    let override_props = fx.ctx.data_dir().join("known-good.properties");
    fs::create_dir_all(fx.ctx.data_dir()).unwrap();
    fs::write(&override_props, "db.user=restored\ndb.password=\n").unwrap();

    let runner = Arc::new(FakeRunner::new(None));
    let controller = stop_controller(runner.clone());
    let mut orchestrator = RollbackOrchestrator::new(
        fx.ctx.clone(),
        runner,
        controller,
        fx.archive.clone(),
        Some(override_props),
    );

    let record = orchestrator.run().await.unwrap();
    assert_eq!(orchestrator.phase(), UpgradePhase::Done);

    // Rollback backs up the *current* (post-failed-upgrade) state...
    assert!(record.root.starts_with(fx.ctx.rollback_backup_root()));
    // ...and restores the operator-supplied configuration.
    let restored = fs::read_to_string(fx.ctx.properties_path()).unwrap();
    assert!(restored.contains("db.user=restored"));
}

#[tokio::test]
async fn rollback_failure_reports_its_phase() {
    let fx = fixture();
    let runner = Arc::new(FakeRunner::new(Some("install.sh")));
    let controller = stop_controller(runner.clone());
    let mut orchestrator =
        RollbackOrchestrator::new(fx.ctx.clone(), runner, controller, fx.archive.clone(), None);

    let err = orchestrator.run().await.unwrap_err();
    assert_eq!(orchestrator.phase(), UpgradePhase::Failed);
    match err {
        Error::UpgradeFailed {
            operation, phase, ..
        } => {
            assert_eq!(operation, "rollback");
            assert_eq!(phase, "verifying");
        }
        other => panic!("expected UpgradeFailed, got {:?}", other),
    }
}
