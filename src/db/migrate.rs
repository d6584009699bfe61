use super::{table_exists, MGMT_DATABASE, SCHEMA_VERSION_TABLE};
use crate::config::DatabasePortal;
use crate::error::{Error, Result};
use crate::exec::CommandRunner;
use shell_escape::escape;
use std::path::PathBuf;
use std::sync::Arc;

/// Version recorded for pre-migrator installations when the version table
/// is created lazily.
const BASELINE_VERSION: &str = "0.6";

/// Drives the external forward-only schema migrator shipped inside the
/// artifact. The migrator owns the `schema_version` table; this type only
/// invokes it and reads the version for display.
pub struct SchemaMigrator {
    runner: Arc<dyn CommandRunner>,
    portal: DatabasePortal,
    migrator_path: PathBuf,
    scripts_dir: PathBuf,
}

impl SchemaMigrator {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        portal: DatabasePortal,
        migrator_path: PathBuf,
        scripts_dir: PathBuf,
    ) -> Self {
        Self {
            runner,
            portal,
            migrator_path,
            scripts_dir,
        }
    }

    fn db_url(&self) -> String {
        format!(
            "jdbc:mysql://{}:{}/{}",
            self.portal.host, self.portal.port, MGMT_DATABASE
        )
    }

    fn credential_args(&self) -> String {
        let mut args = format!("-user={}", self.portal.user);
        if let Some(ref password) = self.portal.password {
            args.push_str(&format!(" -password={}", escape(password.as_str().into())));
        }
        args
    }

    /// Create the version table with a baseline row if it does not exist
    /// yet. Databases that predate the migrator have no version table; a
    /// baseline marker lets the migrator pick up from the right point.
    pub async fn ensure_baseline(&self) -> Result<()> {
        if table_exists(
            self.runner.as_ref(),
            &self.portal,
            MGMT_DATABASE,
            SCHEMA_VERSION_TABLE,
        )
        .await?
        {
            return Ok(());
        }

        tracing::info!(
            "version table '{}' does not exist; initializing it with baseline {}",
            SCHEMA_VERSION_TABLE,
            BASELINE_VERSION
        );

        let command = format!(
            r#"bash {} baseline -baselineVersion={} -baselineDescription="{} version" {} -url={}"#,
            escape(self.migrator_path.to_string_lossy()),
            BASELINE_VERSION,
            BASELINE_VERSION,
            self.credential_args(),
            self.db_url()
        );
        let code = self.runner.run_streaming(&command).await?;
        if code != 0 {
            return Err(Error::Migration(format!(
                "baseline initialization exited with code {}",
                code
            )));
        }
        Ok(())
    }

    /// Run the forward migration over the ordered script directory.
    pub async fn migrate(&self) -> Result<()> {
        let command = format!(
            "bash {} migrate {} -url={} -locations=filesystem:{}",
            escape(self.migrator_path.to_string_lossy()),
            self.credential_args(),
            self.db_url(),
            escape(self.scripts_dir.to_string_lossy())
        );
        let code = self.runner.run_streaming(&command).await?;
        if code != 0 {
            return Err(Error::Migration(format!(
                "schema migration exited with code {}; the database was not fully migrated",
                code
            )));
        }
        Ok(())
    }

    /// Highest version recorded in the version table, or `None` when the
    /// table does not exist (pre-baseline installation).
    pub async fn current_version(&self) -> Result<Option<String>> {
        if !table_exists(
            self.runner.as_ref(),
            &self.portal,
            MGMT_DATABASE,
            SCHEMA_VERSION_TABLE,
        )
        .await?
        {
            return Ok(None);
        }

        let rows = super::MySqlQuery::new(self.runner.as_ref(), &self.portal)
            .query(
                MGMT_DATABASE,
                &format!(
                    "select version from {} order by version desc",
                    SCHEMA_VERSION_TABLE
                ),
            )
            .await?;

        Ok(rows.into_iter().next().and_then(|mut row| row.remove("version")))
    }
}
