use super::node::node_descriptor;
use crate::context::CtlContext;
use crate::error::Error;
use crate::exec::{run_checked, CommandRunner, LocalRunner, RemoteScript, SshRunner};
use crate::output::UserOutput;
use crate::process::ProcRegistry;
use crate::service::ServiceController;
use crate::upgrade::{RollbackOrchestrator, UpgradeOrchestrator};
use shell_escape::escape;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Controller used by the swap machines: stop-only, so no probe or
/// dependency wiring is needed.
fn stop_controller(ctx: &CtlContext, runner: Arc<dyn CommandRunner>) -> ServiceController {
    ServiceController::new(node_descriptor(ctx, None), runner, Arc::new(ProcRegistry))
}

pub async fn run_upgrade_management_node(
    ctx: &CtlContext,
    war_file: PathBuf,
    host: Option<String>,
    output: &dyn UserOutput,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        return swap_remote(ctx, &host, &war_file, "upgrade_management_node", None, output).await;
    }

    let runner: Arc<dyn CommandRunner> = Arc::new(LocalRunner::new(ctx.verbose()));
    let controller = stop_controller(ctx, runner.clone());
    let mut orchestrator =
        UpgradeOrchestrator::new(ctx.clone(), runner, controller, expand_path(&war_file));

    output.status("upgrading the management node; this may take several minutes...");
    let record = orchestrator.run().await?;

    output.success("successfully upgraded the management node to the new version");
    output.status(&format!(
        "the previous version is backed up as follows:\n\
         \tproperty file: {}\n\
         \tartifact: {}\n\
         Test the new version, then delete {} manually once it is stable.\n\
         The node was NOT restarted; start it with 'stackctl start_node'",
        record.config_snapshot.display(),
        record.artifact_snapshot.display(),
        record.root.display()
    ));
    Ok(())
}

pub async fn run_rollback_management_node(
    ctx: &CtlContext,
    war_file: PathBuf,
    host: Option<String>,
    property_file: Option<PathBuf>,
    output: &dyn UserOutput,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        return swap_remote(
            ctx,
            &host,
            &war_file,
            "rollback_management_node",
            property_file.as_deref(),
            output,
        )
        .await;
    }

    let runner: Arc<dyn CommandRunner> = Arc::new(LocalRunner::new(ctx.verbose()));
    let controller = stop_controller(ctx, runner.clone());
    let mut orchestrator = RollbackOrchestrator::new(
        ctx.clone(),
        runner,
        controller,
        expand_path(&war_file),
        property_file.map(|p| expand_path(&p)),
    );

    output.status("rolling back the management node; this may take several minutes...");
    let record = orchestrator.run().await?;

    output.success("successfully rolled back the management node to the previous version");
    output.status(&format!(
        "the replaced (post-upgrade) state is backed up at {} in case it is needed.\n\
         The node was NOT restarted; start it with 'stackctl start_node'",
        record.root.display()
    ));
    Ok(())
}

/// Run the swap on a remote host: ship the archive, re-invoke the same
/// subcommand there, clean the shipped copy up on success.
async fn swap_remote(
    ctx: &CtlContext,
    host: &str,
    war_file: &Path,
    subcommand: &str,
    property_file: Option<&Path>,
    output: &dyn UserOutput,
) -> anyhow::Result<()> {
    let war_file = expand_path(war_file);
    if !war_file.is_file() {
        return Err(Error::Config(format!("{} not found", war_file.display())).into());
    }

    let local = LocalRunner::new(ctx.verbose());
    let remote_war = "/tmp/stackctl-upgrade.war";
    run_checked(
        &local,
        &format!(
            "scp -o UserKnownHostsFile=/dev/null -o StrictHostKeyChecking=no {} {}:{}",
            escape(war_file.to_string_lossy()),
            host,
            remote_war
        ),
    )
    .await?;

    let mut script = RemoteScript::new();
    match property_file {
        Some(property_file) => {
            let contents = std::fs::read_to_string(property_file)?;
            let remote_props = "/tmp/stackctl-rollback.properties";
            script = script.write_file(remote_props, contents).run_args(
                "stackctl",
                &[
                    subcommand,
                    "--war-file",
                    remote_war,
                    "--property-file",
                    remote_props,
                ],
            );
            script = script.run(format!("rm -f {} {}", remote_war, remote_props));
        }
        None => {
            script = script
                .run_args("stackctl", &[subcommand, "--war-file", remote_war])
                .run(format!("rm -f {}", remote_war));
        }
    }

    output.status(&format!(
        "running {} on {}; this may take several minutes...",
        subcommand, host
    ));
    let code = SshRunner::new(host, ctx.verbose())
        .run_script_streaming(&script)
        .await?;
    if code != 0 {
        anyhow::bail!(
            "remote '{}' on {} exited with code {}; the shipped archive is left at {} for inspection",
            subcommand,
            host,
            code,
            remote_war
        );
    }
    output.success(&format!("successfully finished {} on {}", subcommand, host));
    Ok(())
}

/// Expand a leading `~` and make the path absolute.
fn expand_path(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}
