use crate::config::{broker_hosts, PropertyFile};
use crate::context::CtlContext;
use crate::error::{Error, Result};
use crate::exec::{run_checked, CommandRunner, LocalRunner};
use crate::output::UserOutput;
use crate::probe::wait_until;
use crate::process::{pid_alive, read_live_pid_file, ProcessRegistry, ProcRegistry};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Token the UI server process carries on its command line.
const UI_PROCESS_TOKEN: &str = "stack-dashboard";

/// Install marker: the UI bundle's directory. Absent means not installed.
const UI_INSTALL_DIR: &str = "/var/lib/stack/dashboard";

const UI_PID_FILE: &str = "/var/run/stack/dashboard.pid";
const UI_LOG_FILE: &str = "/var/log/stack/dashboard.log";

pub(crate) fn ui_installed() -> bool {
    Path::new(UI_INSTALL_DIR).is_dir()
}

/// Broker URLs the UI connects to, from the indexed broker properties.
/// Credentials must be both present or both absent.
fn broker_urls(props: &PropertyFile) -> Result<String> {
    let hosts = broker_hosts(props)?;
    let username = props.get("broker.username").map(str::to_string);
    let password = props.get("broker.password").map(str::to_string);

    let urls: Vec<String> = match (&username, &password) {
        (Some(username), Some(password)) => hosts
            .iter()
            .map(|(_, host)| format!("{}:{}@{}", username, password, host))
            .collect(),
        (None, None) => hosts.into_iter().map(|(_, host)| host).collect(),
        _ => {
            return Err(Error::Config(format!(
                "broker.username and broker.password must be both set or both unset; check {}",
                props.path().display()
            )))
        }
    };
    Ok(urls.join(","))
}

pub(crate) async fn ui_start(ctx: &CtlContext) -> Result<()> {
    let runner = LocalRunner::new(ctx.verbose());
    let props = PropertyFile::load(ctx.properties_path())?;
    let urls = broker_urls(&props)?;

    if !ui_installed() {
        return Err(Error::Config(format!(
            "{} not found. Is the UI server installed on this host?",
            UI_INSTALL_DIR
        )));
    }

    let pid_file = PathBuf::from(UI_PID_FILE);
    if let Some(pid) = read_live_pid_file(&pid_file) {
        tracing::info!("the UI server is already running [PID:{}]", pid);
        return Ok(());
    }

    // A process without a pid file is a leftover from a crashed start;
    // replace it rather than ending up with two servers.
    if let Some(pid) = ProcRegistry.find(UI_PROCESS_TOKEN).await? {
        tracing::info!("found a zombie UI server [PID:{}], killing it before starting a new one", pid);
        run_checked(&runner, &format!("kill -9 {}", pid)).await?;
    }

    if let Some(parent) = pid_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if let Some(parent) = Path::new(UI_LOG_FILE).parent() {
        std::fs::create_dir_all(parent)?;
    }

    run_checked(
        &runner,
        &format!(
            "nohup {}/bin/{} --broker {} > {} 2>&1 < /dev/null &",
            UI_INSTALL_DIR, UI_PROCESS_TOKEN, urls, UI_LOG_FILE
        ),
    )
    .await?;

    // The server daemonizes itself; grab its pid once it shows up.
    let registry = ProcRegistry;
    let registry_ref = &registry;
    let appeared = wait_until(
        move || async move { matches!(registry_ref.find(UI_PROCESS_TOKEN).await, Ok(Some(_))) },
        Duration::from_secs(5),
        Duration::from_millis(500),
    )
    .await;
    if !appeared {
        return Err(Error::Process(format!(
            "the UI server did not appear within 5 seconds; check {}",
            UI_LOG_FILE
        )));
    }

    let pid = registry.find(UI_PROCESS_TOKEN).await?.ok_or_else(|| {
        Error::Process("the UI server disappeared right after starting".to_string())
    })?;
    std::fs::write(&pid_file, pid.to_string())?;
    tracing::info!("successfully started the UI server [PID:{}]", pid);
    Ok(())
}

pub(crate) async fn ui_stop(ctx: &CtlContext) -> Result<()> {
    let runner = LocalRunner::new(ctx.verbose());
    let pid_file = PathBuf::from(UI_PID_FILE);

    if let Some(pid) = read_live_pid_file(&pid_file) {
        // Graceful first; survivors are swept by token below.
        let _ = runner.run(&format!("kill {}", pid)).await;
    }
    let _ = std::fs::remove_file(&pid_file);

    // Kill every process carrying the token; the server forks workers.
    loop {
        match ProcRegistry.find(UI_PROCESS_TOKEN).await? {
            Some(pid) => {
                run_checked(&runner, &format!("kill -9 {}", pid)).await?;
            }
            None => break,
        }
    }
    tracing::info!("successfully stopped the UI server");
    Ok(())
}

pub async fn run_start_ui(
    ctx: &CtlContext,
    host: Option<String>,
    output: &dyn UserOutput,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        super::reinvoke_remote(&host, "start_ui", ctx.verbose()).await?;
        output.success(&format!("successfully started the UI server on {}", host));
        return Ok(());
    }
    ui_start(ctx).await?;
    output.success("successfully started the UI server on the local host");
    Ok(())
}

pub async fn run_stop_ui(
    ctx: &CtlContext,
    host: Option<String>,
    output: &dyn UserOutput,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        return super::reinvoke_remote(&host, "stop_ui", ctx.verbose()).await;
    }
    ui_stop(ctx).await?;
    output.success("successfully stopped the UI server");
    Ok(())
}

pub async fn run_ui_status(
    ctx: &CtlContext,
    host: Option<String>,
    output: &dyn UserOutput,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        return super::reinvoke_remote(&host, "ui_status", ctx.verbose()).await;
    }

    let pid_file = PathBuf::from(UI_PID_FILE);
    if let Some(pid) = read_live_pid_file(&pid_file) {
        if pid_alive(pid) {
            output.status(&format!("Running [PID:{}]", pid));
            return Ok(());
        }
    }

    match ProcRegistry.find(UI_PROCESS_TOKEN).await? {
        Some(pid) => output.status(&format!("Zombie [PID:{}] (no pid file)", pid)),
        None => output.status("Stopped"),
    }
    Ok(())
}
