//! Ordering and partial-failure tolerance of the topology controller.

use async_trait::async_trait;
use stackctl::error::{Error, Result};
use stackctl::output::UserOutput;
use stackctl::topology::{TopologyController, TopologyMember};
use std::sync::{Arc, Mutex};

/// Discards all messages; the tests assert on the call log instead.
struct NullOutput;

impl UserOutput for NullOutput {
    fn status(&self, _message: &str) {}
    fn success(&self, _message: &str) {}
    fn warning(&self, _message: &str) {}
    fn progress(&self, _message: &str) {}
    fn finish_progress(&self, _message: &str) {}
}

struct FakeMember {
    name: &'static str,
    installed: bool,
    fail: bool,
    log: Arc<Mutex<Vec<String>>>,
}

impl FakeMember {
    fn boxed(
        name: &'static str,
        installed: bool,
        fail: bool,
        log: &Arc<Mutex<Vec<String>>>,
    ) -> Box<dyn TopologyMember> {
        Box::new(Self {
            name,
            installed,
            fail,
            log: log.clone(),
        })
    }

    fn record(&self, action: &str) -> Result<()> {
        self.log.lock().unwrap().push(format!("{} {}", action, self.name));
        if self.fail {
            Err(Error::Process(format!("{} refuses to {}", self.name, action)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TopologyMember for FakeMember {
    fn name(&self) -> &str {
        self.name
    }

    fn installed(&self) -> bool {
        self.installed
    }

    async fn start(&self) -> Result<()> {
        self.record("start")
    }

    async fn stop(&self) -> Result<()> {
        self.record("stop")
    }
}

#[tokio::test]
async fn start_all_runs_in_dependency_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let controller = TopologyController::new(vec![
        FakeMember::boxed("tsdb", true, false, &log),
        FakeMember::boxed("app-node", true, false, &log),
        FakeMember::boxed("ui", true, false, &log),
    ]);

    let report = controller.start_all(&NullOutput).await;
    assert_eq!(
        *log.lock().unwrap(),
        vec!["start tsdb", "start app-node", "start ui"]
    );
    assert_eq!(report.succeeded, vec!["tsdb", "app-node", "ui"]);
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn stop_all_runs_in_reverse_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let controller = TopologyController::new(vec![
        FakeMember::boxed("tsdb", true, false, &log),
        FakeMember::boxed("app-node", true, false, &log),
        FakeMember::boxed("ui", true, false, &log),
    ]);

    controller.stop_all(&NullOutput).await;
    assert_eq!(
        *log.lock().unwrap(),
        vec!["stop ui", "stop app-node", "stop tsdb"]
    );
}

#[tokio::test]
async fn uninstalled_member_is_skipped_not_failed() {
    // The time-series store is not installed: its step is skipped and the
    // UI and app node still stop. The sweep is a success.
    let log = Arc::new(Mutex::new(Vec::new()));
    let controller = TopologyController::new(vec![
        FakeMember::boxed("tsdb", false, false, &log),
        FakeMember::boxed("app-node", true, false, &log),
        FakeMember::boxed("ui", true, false, &log),
    ]);

    let report = controller.stop_all(&NullOutput).await;
    assert_eq!(*log.lock().unwrap(), vec!["stop ui", "stop app-node"]);
    assert_eq!(report.skipped, vec!["tsdb"]);
    assert_eq!(report.succeeded, vec!["ui", "app-node"]);
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn a_failing_step_does_not_abort_the_remaining_steps() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let controller = TopologyController::new(vec![
        FakeMember::boxed("tsdb", true, false, &log),
        FakeMember::boxed("app-node", true, true, &log),
        FakeMember::boxed("ui", true, false, &log),
    ]);

    let report = controller.start_all(&NullOutput).await;
    assert_eq!(
        *log.lock().unwrap(),
        vec!["start tsdb", "start app-node", "start ui"],
        "the ui must still start after the app node failed"
    );
    assert_eq!(report.failed, vec!["app-node"]);
    assert_eq!(report.succeeded, vec!["tsdb", "ui"]);
}
