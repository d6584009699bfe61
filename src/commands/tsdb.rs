use crate::config::PropertyFile;
use crate::context::CtlContext;
use crate::error::{Error, Result};
use crate::exec::{run_checked, LocalRunner};
use crate::output::UserOutput;
use crate::probe::{port_listening, wait_until};
use crate::process::{ProcessRegistry, ProcRegistry};
use shell_escape::escape;
use std::path::PathBuf;
use std::time::Duration;

/// Token the time-series store's JVM carries on its command line.
const TSDB_PROCESS_TOKEN: &str = "tsdb.server.Main";

/// Property naming the installed launcher script; absent means the store
/// is not installed.
const TSDB_LAUNCHER_KEY: &str = "tsdb.launcher";

/// Property naming the store's own config file, which carries its web port.
const TSDB_CONF_KEY: &str = "tsdb.conf";

/// Key inside the store's config file.
const TSDB_PORT_KEY: &str = "web.port";

const STOP_DEADLINE: Duration = Duration::from_secs(30);

/// Launcher path, if the store is installed.
pub(crate) fn tsdb_launcher(props: &PropertyFile) -> Option<PathBuf> {
    props
        .get(TSDB_LAUNCHER_KEY)
        .map(PathBuf::from)
        .filter(|p| p.is_file())
}

pub(crate) async fn tsdb_start(ctx: &CtlContext, wait_timeout: Option<u64>) -> Result<()> {
    let runner = LocalRunner::new(ctx.verbose());
    let props = PropertyFile::load(ctx.properties_path())?;

    if let Some(pid) = ProcRegistry.find(TSDB_PROCESS_TOKEN).await? {
        tracing::info!("the time-series store [PID:{}] is already running", pid);
        return Ok(());
    }

    let Some(launcher) = tsdb_launcher(&props) else {
        return Err(Error::Config(format!(
            "cannot find '{}' in {}. Have you installed the time-series store?",
            TSDB_LAUNCHER_KEY,
            ctx.properties_path().display()
        )));
    };

    run_checked(
        &runner,
        &format!("bash {} start", escape(launcher.to_string_lossy())),
    )
    .await?;
    tracing::info!("started the time-series store");

    let Some(wait_timeout) = wait_timeout else {
        return Ok(());
    };

    let Some(conf) = props.get(TSDB_CONF_KEY).map(PathBuf::from).filter(|p| p.is_file()) else {
        tracing::warn!(
            "cannot find '{}' in {}, ignoring --wait-timeout",
            TSDB_CONF_KEY,
            ctx.properties_path().display()
        );
        return Ok(());
    };

    let store_conf = PropertyFile::load(&conf)?;
    let port: u16 = store_conf
        .require(TSDB_PORT_KEY)?
        .parse()
        .map_err(|_| Error::Config(format!("'{}' in {} is not a port", TSDB_PORT_KEY, conf.display())))?;

    tracing::info!(
        "waiting up to {}s for the time-series store to listen on port {}",
        wait_timeout,
        port
    );
    let listening = wait_until(
        move || async move { port_listening(port).await },
        Duration::from_secs(wait_timeout),
        Duration::from_secs(1),
    )
    .await;
    if !listening {
        return Err(Error::Timeout(format!(
            "the time-series store to listen on port {} within {} seconds; it may not have started, check its log",
            port, wait_timeout
        )));
    }
    tracing::info!("the time-series store is listening on port {}", port);
    Ok(())
}

pub(crate) async fn tsdb_stop(ctx: &CtlContext) -> Result<()> {
    let runner = LocalRunner::new(ctx.verbose());
    let registry = ProcRegistry;

    let Some(pid) = registry.find(TSDB_PROCESS_TOKEN).await? else {
        tracing::info!("the time-series store is already stopped");
        return Ok(());
    };

    // Prefer the launcher's own stop routine; fall back to a plain kill
    // when the install is damaged.
    let launcher = PropertyFile::load(ctx.properties_path())
        .ok()
        .and_then(|props| tsdb_launcher(&props));
    match launcher {
        Some(launcher) => {
            run_checked(
                &runner,
                &format!("bash {} stop", escape(launcher.to_string_lossy())),
            )
            .await?;
        }
        None => {
            run_checked(&runner, &format!("kill {}", pid)).await?;
        }
    }

    let registry_ref = &registry;
    let gone = wait_until(
        move || async move { matches!(registry_ref.find(TSDB_PROCESS_TOKEN).await, Ok(None)) },
        STOP_DEADLINE,
        Duration::from_secs(1),
    )
    .await;
    if gone {
        tracing::info!("successfully stopped the time-series store");
        return Ok(());
    }

    tracing::warn!(
        "the time-series store is still running after {} seconds, killing it",
        STOP_DEADLINE.as_secs()
    );
    if let Some(pid) = registry.find(TSDB_PROCESS_TOKEN).await? {
        run_checked(&runner, &format!("kill -9 {}", pid)).await?;
    }
    Ok(())
}

pub async fn run_tsdb(
    ctx: &CtlContext,
    start: bool,
    stop: bool,
    wait_timeout: Option<u64>,
    output: &dyn UserOutput,
) -> anyhow::Result<()> {
    if start {
        tsdb_start(ctx, wait_timeout).await?;
        output.success("successfully started the time-series store");
    } else if stop {
        tsdb_stop(ctx).await?;
        output.success("successfully stopped the time-series store");
    } else {
        // Default, like an explicit --status.
        match ProcRegistry.find(TSDB_PROCESS_TOKEN).await? {
            Some(pid) => output.status(&format!("the time-series store [PID:{}] is running", pid)),
            None => output.status("the time-series store is stopped"),
        }
    }
    Ok(())
}
