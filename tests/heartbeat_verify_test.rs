//! The database-mutation gate: no migration may proceed while a management
//! node is still writing. Exercises the two-sample heartbeat staleness
//! check against a scripted registry.

use async_trait::async_trait;
use stackctl::db::{verify_nodes_stopped, HeartbeatSample, NodeRegistry};
use stackctl::error::{Error, Result};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Registry returning pre-scripted samples, one per call.
struct ScriptedRegistry {
    samples: Mutex<VecDeque<Vec<HeartbeatSample>>>,
}

impl ScriptedRegistry {
    fn new(samples: Vec<Vec<HeartbeatSample>>) -> Self {
        Self {
            samples: Mutex::new(samples.into()),
        }
    }

    fn remaining(&self) -> usize {
        self.samples.lock().unwrap().len()
    }
}

#[async_trait]
impl NodeRegistry for ScriptedRegistry {
    async fn sample(&self) -> Result<Vec<HeartbeatSample>> {
        Ok(self
            .samples
            .lock()
            .unwrap()
            .pop_front()
            .expect("registry sampled more often than scripted"))
    }
}

fn node(hostname: &str, heartbeat: &str) -> HeartbeatSample {
    HeartbeatSample {
        hostname: hostname.to_string(),
        heartbeat: heartbeat.to_string(),
    }
}

const GRACE: Duration = Duration::from_millis(100);

#[tokio::test]
async fn empty_registry_passes_without_force() {
    let registry = ScriptedRegistry::new(vec![vec![]]);
    verify_nodes_stopped(&registry, false, GRACE).await.unwrap();
}

#[tokio::test]
async fn live_node_without_force_fails_and_never_resamples() {
    let registry = ScriptedRegistry::new(vec![vec![
        node("10.0.0.5", "100"),
        node("10.0.0.6", "200"),
    ]]);
    let err = verify_nodes_stopped(&registry, false, GRACE)
        .await
        .unwrap_err();
    match err {
        Error::NodesStillRunning(hosts) => {
            assert_eq!(hosts, vec!["10.0.0.5".to_string(), "10.0.0.6".to_string()]);
        }
        other => panic!("expected NodesStillRunning, got {:?}", other),
    }
    // Without --force there must be no second query and no grace wait.
    assert_eq!(registry.remaining(), 0);
}

#[tokio::test]
async fn force_with_unchanged_heartbeat_passes_after_the_grace_period() {
    let registry = ScriptedRegistry::new(vec![
        vec![node("10.0.0.5", "100")],
        vec![node("10.0.0.5", "100")],
    ]);
    let start = Instant::now();
    verify_nodes_stopped(&registry, true, GRACE).await.unwrap();
    assert!(
        start.elapsed() >= GRACE,
        "the verifier must wait out the grace period before resampling"
    );
}

#[tokio::test]
async fn force_with_changed_heartbeat_fails() {
    let registry = ScriptedRegistry::new(vec![
        vec![node("10.0.0.5", "100")],
        vec![node("10.0.0.5", "101")],
    ]);
    let err = verify_nodes_stopped(&registry, true, GRACE)
        .await
        .unwrap_err();
    match err {
        Error::NodeStillAlive {
            hostname,
            before,
            after,
        } => {
            assert_eq!(hostname, "10.0.0.5");
            assert_eq!(before, "100");
            assert_eq!(after, "101");
        }
        other => panic!("expected NodeStillAlive, got {:?}", other),
    }
}

#[tokio::test]
async fn force_only_compares_nodes_present_in_both_samples() {
    // The stale row vanished between samples and a different host appeared:
    // neither is evidence of a live writer.
    let registry = ScriptedRegistry::new(vec![
        vec![node("10.0.0.5", "100")],
        vec![node("10.0.0.9", "999")],
    ]);
    verify_nodes_stopped(&registry, true, GRACE).await.unwrap();
}

#[tokio::test]
async fn force_with_one_live_node_among_stale_ones_fails() {
    let registry = ScriptedRegistry::new(vec![
        vec![node("10.0.0.5", "100"), node("10.0.0.6", "500")],
        vec![node("10.0.0.5", "100"), node("10.0.0.6", "503")],
    ]);
    let err = verify_nodes_stopped(&registry, true, GRACE)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NodeStillAlive { .. }));
}
