use super::node::{node_state, NODE_PROCESS_TOKEN};
use crate::config::{DatabasePortal, PropertyFile};
use crate::context::CtlContext;
use crate::db::SchemaMigrator;
use crate::exec::LocalRunner;
use crate::output::UserOutput;
use crate::process::{ProcessRegistry, ProcRegistry};
use crate::service::NodeState;
use serde::Serialize;
use std::sync::Arc;

/// Everything `status` reports, also serialized for `--json`.
#[derive(Debug, Serialize)]
struct StatusReport {
    home: String,
    properties_file: String,
    log_file: String,
    pid: Option<u32>,
    state: NodeState,
    schema_version: Option<String>,
}

pub async fn run_status(
    ctx: &CtlContext,
    host: Option<String>,
    json: bool,
    output: &dyn UserOutput,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        let args = if json { "status --json" } else { "status" };
        return super::reinvoke_remote(&host, args, ctx.verbose()).await;
    }

    let props = PropertyFile::load(ctx.properties_path()).ok();
    if props.is_none() {
        output.warning(&format!(
            "cannot find {}, your installation may have been corrupted",
            ctx.properties_path().display()
        ));
    }

    let pid = ProcRegistry.find(NODE_PROCESS_TOKEN).await?;
    let state = node_state(ctx, props.as_ref()).await?;
    let schema_version = match props.as_ref() {
        Some(props) => schema_version(ctx, props).await,
        None => None,
    };

    let report = StatusReport {
        home: ctx.home().display().to_string(),
        properties_file: ctx.properties_path().display().to_string(),
        log_file: ctx.node_log_path().display().to_string(),
        pid,
        state,
        schema_version,
    };

    if json {
        output.status(&serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    output.status(&format!("STACK_HOME: {}", report.home));
    output.status(&format!("properties file: {}", report.properties_file));
    output.status(&format!("log file: {}", report.log_file));
    match report.pid {
        Some(pid) => output.status(&format!("PID: {}", pid)),
        None => output.status("PID: -"),
    }
    let state_line = match report.state {
        NodeState::Zombie => format!(
            "status: {}, the management node stopped responding to the API but its process is still alive. Stop it with 'stackctl stop_node'",
            report.state
        ),
        NodeState::Starting => format!("status: {}, should be ready in a few seconds", report.state),
        other => format!("status: {}", other),
    };
    output.status(&state_line);
    output.status(&format!(
        "version: {}",
        report
            .schema_version
            .as_deref()
            .unwrap_or("unknown, the database is not reachable")
    ));

    Ok(())
}

/// Schema version for display. A missing version table reads as the
/// pre-migrator baseline; an unreachable database reads as unknown.
async fn schema_version(ctx: &CtlContext, props: &PropertyFile) -> Option<String> {
    let portal = DatabasePortal::from_properties(props).ok()?;
    let migrator = SchemaMigrator::new(
        Arc::new(LocalRunner::new(ctx.verbose())),
        portal,
        ctx.migrator_path(),
        ctx.migration_scripts_dir(),
    );
    match migrator.current_version().await {
        Ok(Some(version)) => Some(version),
        Ok(None) => Some("0.6".to_string()),
        Err(_) => None,
    }
}
