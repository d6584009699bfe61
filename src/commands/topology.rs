use super::node::{start_node_local, stop_node_local};
use super::tsdb::{tsdb_launcher, tsdb_start, tsdb_stop};
use super::ui::{ui_installed, ui_start, ui_stop};
use crate::config::PropertyFile;
use crate::context::CtlContext;
use crate::error::Result;
use crate::output::UserOutput;
use crate::topology::{TopologyController, TopologyMember};
use async_trait::async_trait;
use std::time::Duration;

/// Startup wait applied to services when the whole topology starts.
const TOPOLOGY_START_TIMEOUT: Duration = Duration::from_secs(300);

/// Port-listen wait for the time-series store during a topology start.
const TSDB_WAIT_TIMEOUT: u64 = 120;

struct TsdbMember {
    ctx: CtlContext,
}

#[async_trait]
impl TopologyMember for TsdbMember {
    fn name(&self) -> &str {
        "the time-series store"
    }

    fn installed(&self) -> bool {
        PropertyFile::load(self.ctx.properties_path())
            .ok()
            .and_then(|props| tsdb_launcher(&props))
            .is_some()
    }

    async fn start(&self) -> Result<()> {
        tsdb_start(&self.ctx, Some(TSDB_WAIT_TIMEOUT)).await
    }

    async fn stop(&self) -> Result<()> {
        tsdb_stop(&self.ctx).await
    }
}

struct AppNodeMember {
    ctx: CtlContext,
}

#[async_trait]
impl TopologyMember for AppNodeMember {
    fn name(&self) -> &str {
        "the management node"
    }

    fn installed(&self) -> bool {
        // The management node is the installation; it is always a member.
        true
    }

    async fn start(&self) -> Result<()> {
        start_node_local(&self.ctx, TOPOLOGY_START_TIMEOUT).await
    }

    async fn stop(&self) -> Result<()> {
        stop_node_local(&self.ctx, false).await
    }
}

struct UiMember {
    ctx: CtlContext,
}

#[async_trait]
impl TopologyMember for UiMember {
    fn name(&self) -> &str {
        "the web UI"
    }

    fn installed(&self) -> bool {
        ui_installed()
    }

    async fn start(&self) -> Result<()> {
        ui_start(&self.ctx).await
    }

    async fn stop(&self) -> Result<()> {
        ui_stop(&self.ctx).await
    }
}

/// The deployment in start order. The database and broker are assumed
/// externally managed and are not members.
fn controller(ctx: &CtlContext) -> TopologyController {
    TopologyController::new(vec![
        Box::new(TsdbMember { ctx: ctx.clone() }),
        Box::new(AppNodeMember { ctx: ctx.clone() }),
        Box::new(UiMember { ctx: ctx.clone() }),
    ])
}

/// `start`: bring up every installed service in dependency order.
pub async fn run_start_all(ctx: &CtlContext, output: &dyn UserOutput) -> anyhow::Result<()> {
    let report = controller(ctx).start_all(output).await;
    if report.failed.is_empty() {
        output.success("all installed services started");
    } else {
        output.warning(&format!(
            "some services failed to start: {}; the others were still started",
            report.failed.join(", ")
        ));
    }
    Ok(())
}

/// `stop`: bring down every installed service in reverse order.
pub async fn run_stop_all(ctx: &CtlContext, output: &dyn UserOutput) -> anyhow::Result<()> {
    let report = controller(ctx).stop_all(output).await;
    if report.failed.is_empty() {
        output.success("all installed services stopped");
    } else {
        output.warning(&format!(
            "some services failed to stop: {}; the others were still stopped",
            report.failed.join(", ")
        ));
    }
    Ok(())
}
