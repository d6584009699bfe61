use super::{MySqlQuery, MGMT_DATABASE, NODE_REGISTRY_TABLE};
use crate::config::DatabasePortal;
use crate::error::{Error, Result};
use crate::exec::CommandRunner;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Grace period between the two heartbeat samples of the forced check.
///
/// Known limitation, not configurable: a node whose heartbeat
/// interval exceeds this window is misclassified as stopped. The check is
/// a staleness heuristic, not a guarantee.
pub const HEARTBEAT_GRACE: Duration = Duration::from_secs(10);

/// One row of the active-node registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatSample {
    pub hostname: String,
    pub heartbeat: String,
}

/// Reads the active-node registry table.
#[async_trait]
pub trait NodeRegistry: Send + Sync {
    async fn sample(&self) -> Result<Vec<HeartbeatSample>>;
}

/// Production registry: queries the `management_node` table through the
/// `mysql` client.
pub struct MySqlNodeRegistry {
    runner: Arc<dyn CommandRunner>,
    portal: DatabasePortal,
}

impl MySqlNodeRegistry {
    pub fn new(runner: Arc<dyn CommandRunner>, portal: DatabasePortal) -> Self {
        Self { runner, portal }
    }
}

#[async_trait]
impl NodeRegistry for MySqlNodeRegistry {
    async fn sample(&self) -> Result<Vec<HeartbeatSample>> {
        let rows = MySqlQuery::new(self.runner.as_ref(), &self.portal)
            .query(
                MGMT_DATABASE,
                &format!("select hostname,heartbeat from {}", NODE_REGISTRY_TABLE),
            )
            .await?;

        rows.into_iter()
            .map(|mut row| {
                let hostname = row.remove("hostname").ok_or_else(|| {
                    Error::Process("node registry row is missing 'hostname'".to_string())
                })?;
                let heartbeat = row.remove("heartbeat").ok_or_else(|| {
                    Error::Process("node registry row is missing 'heartbeat'".to_string())
                })?;
                Ok(HeartbeatSample {
                    hostname,
                    heartbeat,
                })
            })
            .collect()
    }
}

/// Verify that no management node is still writing before a schema
/// mutation.
///
/// Without `force`, any registered node fails the check outright: the
/// operator must stop the nodes first. With `force`, registry rows are
/// treated as potentially stale: the verifier waits `grace`, samples
/// again, and fails only if a node's heartbeat advanced between the two
/// samples.
pub async fn verify_nodes_stopped(
    registry: &dyn NodeRegistry,
    force: bool,
    grace: Duration,
) -> Result<()> {
    let nodes = registry.sample().await?;
    if nodes.is_empty() {
        return Ok(());
    }

    let hostnames: Vec<String> = nodes.iter().map(|n| n.hostname.clone()).collect();
    if !force {
        return Err(Error::NodesStillRunning(hostnames));
    }

    tracing::info!(
        "nodes {:?} are still registered; as --force is set, waiting {}s to check whether the records are stale",
        hostnames,
        grace.as_secs()
    );
    tokio::time::sleep(grace).await;

    let resampled = registry.sample().await?;
    for new in &resampled {
        for old in &nodes {
            if old.hostname == new.hostname && old.heartbeat != new.heartbeat {
                return Err(Error::NodeStillAlive {
                    hostname: new.hostname.clone(),
                    before: old.heartbeat.clone(),
                    after: new.heartbeat.clone(),
                });
            }
        }
    }

    Ok(())
}
