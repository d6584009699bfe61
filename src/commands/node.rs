use crate::config::{broker_hosts, DatabasePortal, PropertyFile, BROKER_PORT};
use crate::context::CtlContext;
use crate::db::mysql_client_args;
use crate::error::{Error, Result};
use crate::exec::{CommandRunner, LocalRunner};
use crate::output::UserOutput;
use crate::probe::{port_listening, ApiReadinessProbe, MGMT_API_PORT};
use crate::process::ProcRegistry;
use crate::service::{
    DependencyEndpoint, NodeState, ServiceController, ServiceDescriptor, ServiceKind,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Token the management node's JVM carries on its command line.
pub(crate) const NODE_PROCESS_TOKEN: &str = "appName=management";

/// Descriptor of the local management node service.
pub(crate) fn node_descriptor(ctx: &CtlContext, props: Option<&PropertyFile>) -> ServiceDescriptor {
    let home = ctx.home().display().to_string();
    let pid_file = props
        .and_then(|p| p.get("pidFilePath"))
        .map(PathBuf::from)
        .unwrap_or_else(|| ctx.data_dir().join("management-node.pid"));

    ServiceDescriptor::new(
        "management node",
        ServiceKind::AppNode,
        format!(
            "sudo -u {} bash {}/bin/startup.sh -DappName=management",
            ctx.service_account(),
            home
        ),
        format!("bash {}/bin/shutdown.sh", home),
        NODE_PROCESS_TOKEN,
    )
    .with_pid_file(pid_file)
}

/// Controller for the local management node, with its readiness probe and
/// dependency endpoints wired in.
pub(crate) fn node_controller(
    ctx: &CtlContext,
    runner: Arc<dyn CommandRunner>,
    props: &PropertyFile,
) -> Result<ServiceController> {
    let portal = DatabasePortal::from_properties(props)?;

    let mut dependencies = vec![DependencyEndpoint::new(
        "database",
        portal.host.clone(),
        portal.port,
    )];
    for (key, host) in broker_hosts(props)? {
        dependencies.push(DependencyEndpoint::new(
            format!("message broker ({})", key),
            host,
            BROKER_PORT,
        ));
    }

    Ok(
        ServiceController::new(node_descriptor(ctx, Some(props)), runner, Arc::new(ProcRegistry))
            .with_probe(Arc::new(ApiReadinessProbe::local()))
            .with_dependencies(dependencies),
    )
}

/// Start the local management node and wait for API readiness.
pub(crate) async fn start_node_local(ctx: &CtlContext, timeout: Duration) -> Result<()> {
    let runner: Arc<dyn CommandRunner> = Arc::new(LocalRunner::new(ctx.verbose()));
    let props = PropertyFile::load(ctx.properties_path())?;
    let controller = node_controller(ctx, runner.clone(), &props)?;

    if let Some(pid) = controller.find_pid().await? {
        tracing::info!("the management node [PID:{}] is already running", pid);
        return Ok(());
    }

    // The startup script writes a boot-error marker on early failure;
    // clear a stale one so the timeout diagnosis below reads fresh state.
    let boot_error = ctx.boot_error_path();
    let _ = std::fs::remove_file(&boot_error);

    // The API port must be free before the JVM tries to bind it.
    if port_listening(MGMT_API_PORT).await {
        return Err(Error::Config(format!(
            "port {} is occupied by another process. Use netstat to find it and stop it",
            MGMT_API_PORT
        )));
    }

    // Reachability of db/broker is verified by the controller; a reachable
    // database with wrong credentials is caught here instead.
    let portal = DatabasePortal::from_properties(&props)?;
    let auth_check = runner
        .run(&format!(r#"{} -e "select 1""#, mysql_client_args(&portal)))
        .await?;
    if !auth_check.success() {
        return Err(Error::Config(format!(
            "unable to connect to the database at {}:{} with the configured credentials: {}",
            portal.host,
            portal.port,
            auth_check.stderr.trim()
        )));
    }

    match controller.start(timeout).await {
        Ok(()) => Ok(()),
        Err(Error::StartupTimeout { service, timeout }) => {
            // Prefer the node's own boot error over a generic timeout.
            if let Ok(contents) = std::fs::read_to_string(&boot_error) {
                return Err(Error::Config(format!(
                    "the management node failed to boot; details are in {}, here is a brief of the error:\n{}",
                    ctx.node_log_path().display(),
                    contents.trim()
                )));
            }
            Err(Error::StartupTimeout { service, timeout })
        }
        Err(e) => Err(e),
    }
}

/// Stop the local management node.
pub(crate) async fn stop_node_local(ctx: &CtlContext, force: bool) -> Result<()> {
    let runner: Arc<dyn CommandRunner> = Arc::new(LocalRunner::new(ctx.verbose()));
    // Stop must work even when the property file is damaged, so the
    // controller is built without probe or dependency wiring.
    let props = PropertyFile::load(ctx.properties_path()).ok();
    let controller = ServiceController::new(
        node_descriptor(ctx, props.as_ref()),
        runner,
        Arc::new(ProcRegistry),
    );
    controller.stop(force).await
}

pub async fn run_start_node(
    ctx: &CtlContext,
    timeout: u64,
    host: Option<String>,
    output: &dyn UserOutput,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        output.status("it may take a while because stackctl waits for the management node to be ready to serve the API");
        return super::reinvoke_remote(
            &host,
            &format!("start_node --timeout={}", timeout),
            ctx.verbose(),
        )
        .await;
    }

    start_node_local(ctx, Duration::from_secs(timeout)).await?;
    output.success("successfully started the management node");
    Ok(())
}

pub async fn run_stop_node(
    ctx: &CtlContext,
    force: bool,
    host: Option<String>,
    output: &dyn UserOutput,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        let args = if force { "stop_node --force" } else { "stop_node" };
        return super::reinvoke_remote(&host, args, ctx.verbose()).await;
    }

    stop_node_local(ctx, force).await?;
    output.success("successfully stopped the management node");
    Ok(())
}

/// Current state of the local management node, combining process discovery
/// with the protocol-level probe.
pub(crate) async fn node_state(ctx: &CtlContext, props: Option<&PropertyFile>) -> Result<NodeState> {
    use crate::probe::ApiReadiness;

    let controller = ServiceController::new(
        node_descriptor(ctx, props),
        Arc::new(LocalRunner::new(ctx.verbose())),
        Arc::new(ProcRegistry),
    );
    let Some(_pid) = controller.find_pid().await? else {
        return Ok(NodeState::Stopped);
    };

    Ok(match ApiReadinessProbe::local().probe().await {
        ApiReadiness::Serving => NodeState::Running,
        ApiReadiness::Booting => NodeState::Starting,
        ApiReadiness::Unreachable => NodeState::Zombie,
        ApiReadiness::Indeterminate => NodeState::Unknown,
    })
}
