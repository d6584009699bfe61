use crate::config::{DatabasePortal, PropertyFile};
use crate::context::CtlContext;
use crate::db::{
    check_root_connectivity, dump_database, restore_dump, verify_nodes_stopped, MySqlNodeRegistry,
    SchemaMigrator, HEARTBEAT_GRACE,
};
use crate::error::Error;
use crate::exec::{ensure_tool, CommandRunner, LocalRunner};
use crate::output::UserOutput;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;

/// Upgrade the database schema to the version shipped with the current
/// artifact. Refuses to run while management nodes are registered alive.
pub async fn run_upgrade_db(
    ctx: &CtlContext,
    force: bool,
    no_backup: bool,
    dry_run: bool,
    output: &dyn UserOutput,
) -> anyhow::Result<()> {
    let runner: Arc<dyn CommandRunner> = Arc::new(LocalRunner::new(ctx.verbose()));
    ensure_tool(runner.as_ref(), "mysqldump").await?;
    ensure_tool(runner.as_ref(), "mysql").await?;

    let migrator_path = ctx.migrator_path();
    if !migrator_path.is_file() {
        return Err(Error::Config(format!(
            "cannot find {}. Have you run upgrade_management_node?",
            migrator_path.display()
        ))
        .into());
    }
    let scripts_dir = ctx.migration_scripts_dir();
    if !scripts_dir.is_dir() {
        return Err(Error::Config(format!(
            "cannot find {}. Have you run upgrade_management_node?",
            scripts_dir.display()
        ))
        .into());
    }

    let props = PropertyFile::load(ctx.properties_path())?;
    let portal = DatabasePortal::from_properties(&props)?;

    let registry = MySqlNodeRegistry::new(runner.clone(), portal.clone());
    verify_nodes_stopped(&registry, force, HEARTBEAT_GRACE).await?;

    if dry_run {
        output.success("Dry run finished. The database can be upgraded.");
        return Ok(());
    }

    let mut dump_path: Option<PathBuf> = None;
    if no_backup {
        output.warning("skipping the database backup as requested by --no-backup");
    } else {
        output.status("backing up the database before migration...");
        let dest = ctx
            .db_backup_root()
            .join(Utc::now().format("%Y-%m-%d-%H-%M-%S").to_string())
            .join("backup.sql");
        dump_database(runner.as_ref(), &portal, &dest).await?;
        output.status(&format!("successfully backed up the database to {}", dest.display()));
        dump_path = Some(dest);
    }

    let migrator = SchemaMigrator::new(runner, portal, migrator_path, scripts_dir);
    migrator.ensure_baseline().await?;
    let before = migrator.current_version().await?;
    migrator.migrate().await?;
    let after = migrator.current_version().await?;

    match (&before, &after) {
        (Some(before), Some(after)) if before == after => {
            output.status(&format!("the schema was already at version {}", after));
        }
        (_, Some(after)) => {
            output.status(&format!("the schema is now at version {}", after));
        }
        _ => {}
    }
    output.success("successfully upgraded the database to the latest version");
    if let Some(dump) = dump_path {
        output.status(&format!(
            "the pre-upgrade dump is retained at {}; delete it once the new version is stable",
            dump.display()
        ));
    }
    Ok(())
}

/// Restore the database from a dump taken before a failed upgrade.
pub async fn run_rollback_db(
    ctx: &CtlContext,
    db_dump: PathBuf,
    root_password: Option<String>,
    force: bool,
    output: &dyn UserOutput,
) -> anyhow::Result<()> {
    let runner: Arc<dyn CommandRunner> = Arc::new(LocalRunner::new(ctx.verbose()));
    ensure_tool(runner.as_ref(), "mysql").await?;

    let props = PropertyFile::load(ctx.properties_path())?;
    let portal = DatabasePortal::from_properties(&props)?;

    let registry = MySqlNodeRegistry::new(runner.clone(), portal.clone());
    verify_nodes_stopped(&registry, force, HEARTBEAT_GRACE).await?;

    if !db_dump.is_file() {
        return Err(Error::Config(format!("{} not found", db_dump.display())).into());
    }

    check_root_connectivity(
        runner.as_ref(),
        &portal.host,
        portal.port,
        root_password.as_deref(),
    )
    .await?;

    output.status("rolling back the database...");
    restore_dump(
        runner.as_ref(),
        &portal.host,
        portal.port,
        root_password.as_deref(),
        &db_dump,
    )
    .await?;

    output.success(&format!(
        "successfully rolled back the database to the dump file {}",
        db_dump.display()
    ));
    Ok(())
}
