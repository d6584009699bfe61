mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use stackctl::{commands, output, CtlContext, Error as CtlError};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        if let Some(ctl_error) = e.downcast_ref::<CtlError>() {
            eprintln!("ERROR: {}", ctl_error);
            if let Some(suggestion) = ctl_error.suggestion() {
                eprintln!("\nHint: {}", suggestion);
            }
        } else {
            eprintln!("ERROR: {:#}", e);
        }
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose)?;

    // Every command manipulates root-owned services, files or identities.
    if !nix::unistd::geteuid().is_root() {
        anyhow::bail!("stackctl needs root privilege, please run with sudo");
    }

    let ctx = CtlContext::discover(cli.verbose)?;
    let out = output::CliOutput;

    match cli.command {
        Commands::Status { host, json } => {
            commands::run_status(&ctx, host, json, &out).await?;
        }
        Commands::StartNode { timeout, host } => {
            commands::run_start_node(&ctx, timeout, host, &out).await?;
        }
        Commands::StopNode { force, host } => {
            commands::run_stop_node(&ctx, force, host, &out).await?;
        }
        Commands::Start => {
            commands::run_start_all(&ctx, &out).await?;
        }
        Commands::Stop => {
            commands::run_stop_all(&ctx, &out).await?;
        }
        Commands::UpgradeManagementNode { war_file, host } => {
            commands::run_upgrade_management_node(&ctx, war_file, host, &out).await?;
        }
        Commands::RollbackManagementNode {
            war_file,
            host,
            property_file,
        } => {
            commands::run_rollback_management_node(&ctx, war_file, host, property_file, &out)
                .await?;
        }
        Commands::UpgradeDb {
            force,
            no_backup,
            dry_run,
        } => {
            commands::run_upgrade_db(&ctx, force, no_backup, dry_run, &out).await?;
        }
        Commands::RollbackDb {
            db_dump,
            root_password,
            force,
        } => {
            commands::run_rollback_db(&ctx, db_dump, root_password, force, &out).await?;
        }
        Commands::Tsdb {
            start,
            stop,
            status: _,
            wait_timeout,
        } => {
            commands::run_tsdb(&ctx, start, stop, wait_timeout, &out).await?;
        }
        Commands::StartUi { host } => {
            commands::run_start_ui(&ctx, host, &out).await?;
        }
        Commands::StopUi { host } => {
            commands::run_stop_ui(&ctx, host, &out).await?;
        }
        Commands::UiStatus { host } => {
            commands::run_ui_status(&ctx, host, &out).await?;
        }
        Commands::SaveConfig { save_to } => {
            commands::run_save_config(&ctx, save_to, &out).await?;
        }
        Commands::RestoreConfig { restore_from } => {
            commands::run_restore_config(&ctx, restore_from, &out).await?;
        }
        Commands::Configure { host, properties } => {
            commands::run_configure(&ctx, host, properties, &out).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
