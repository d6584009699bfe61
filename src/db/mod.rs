//! Database access for orchestration.
//!
//! The orchestrator never links a database driver: every query and every
//! dump/restore shells out to the `mysql`/`mysqldump` clients through the
//! [`CommandRunner`] seam, exactly as the management node's operators do by
//! hand. Tests substitute a fake runner.

mod heartbeat;
mod migrate;

pub use heartbeat::{
    verify_nodes_stopped, HeartbeatSample, MySqlNodeRegistry, NodeRegistry, HEARTBEAT_GRACE,
};
pub use migrate::SchemaMigrator;

use crate::config::DatabasePortal;
use crate::error::{Error, Result};
use crate::exec::{run_checked, CommandRunner};
use shell_escape::escape;
use std::collections::HashMap;
use std::path::Path;

/// Logical database holding the management node's tables.
pub const MGMT_DATABASE: &str = "stack";

/// Table recording live management nodes and their heartbeats.
pub const NODE_REGISTRY_TABLE: &str = "management_node";

/// Table owned by the schema migrator.
pub const SCHEMA_VERSION_TABLE: &str = "schema_version";

/// Base `mysql` client invocation for a portal: credentials, host, port.
pub fn mysql_client_args(portal: &DatabasePortal) -> String {
    let mut cmd = format!("mysql -u {}", portal.user);
    if let Some(ref password) = portal.password {
        cmd.push_str(&format!(" -p{}", escape(password.as_str().into())));
    }
    cmd.push_str(&format!(" --host {} --port {}", portal.host, portal.port));
    cmd
}

/// Run a SQL statement in vertical (`\G`) output mode and parse the rows.
pub struct MySqlQuery<'a> {
    runner: &'a dyn CommandRunner,
    portal: &'a DatabasePortal,
}

impl<'a> MySqlQuery<'a> {
    pub fn new(runner: &'a dyn CommandRunner, portal: &'a DatabasePortal) -> Self {
        Self { runner, portal }
    }

    /// Execute `sql` against `database` and return one map per row.
    pub async fn query(&self, database: &str, sql: &str) -> Result<Vec<HashMap<String, String>>> {
        let command = format!(
            r#"{} -t {} -e "{}\G""#,
            mysql_client_args(self.portal),
            database,
            sql
        );
        let output = run_checked(self.runner, &command).await?;
        parse_vertical_output(sql, &output.stdout)
    }
}

/// Parse `mysql ... -e "...\G"` vertical output:
///
/// ```text
/// *************************** 1. row ***************************
/// hostname: 10.0.0.5
/// heartbeat: 2024-03-01 10:00:00
/// ```
pub fn parse_vertical_output(sql: &str, output: &str) -> Result<Vec<HashMap<String, String>>> {
    let output = output.trim();
    let mut rows = Vec::new();
    if output.is_empty() {
        return Ok(rows);
    }

    let mut current: Option<HashMap<String, String>> = None;
    for line in output.lines() {
        if line.starts_with("*********") {
            if let Some(row) = current.take() {
                rows.push(row);
            }
            current = Some(HashMap::new());
            continue;
        }

        let Some(ref mut row) = current else {
            return Err(Error::Process(format!(
                "cannot parse mysql output for sql \"{}\", output:\n{}",
                sql, output
            )));
        };

        let line = line.trim();
        let Some((key, value)) = line.split_once(':') else {
            return Err(Error::Process(format!(
                "cannot parse mysql output line '{}' for sql \"{}\"",
                line, sql
            )));
        };
        row.insert(key.trim().to_string(), value.trim_start().to_string());
    }
    if let Some(row) = current {
        rows.push(row);
    }

    Ok(rows)
}

/// Does `table` exist in `database`?
pub async fn table_exists(
    runner: &dyn CommandRunner,
    portal: &DatabasePortal,
    database: &str,
    table: &str,
) -> Result<bool> {
    let command = format!(
        r#"{} -t {} -e "show tables like '{}'""#,
        mysql_client_args(portal),
        database,
        table
    );
    let output = run_checked(runner, &command).await?;
    Ok(output.stdout.contains(table))
}

/// Dump the management database to `dest` with `mysqldump`.
pub async fn dump_database(
    runner: &dyn CommandRunner,
    portal: &DatabasePortal,
    dest: &Path,
) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::Backup(format!("cannot create {}: {}", parent.display(), e))
        })?;
    }
    let mut command = format!("mysqldump -u {}", portal.user);
    if let Some(ref password) = portal.password {
        command.push_str(&format!(" -p{}", escape(password.as_str().into())));
    }
    command.push_str(&format!(
        " --host {} --port {} {} > {}",
        portal.host,
        portal.port,
        MGMT_DATABASE,
        escape(dest.to_string_lossy())
    ));
    run_checked(runner, &command)
        .await
        .map_err(|e| Error::Backup(format!("database dump failed: {}", e)))?;
    Ok(())
}

/// Pipe a previously taken dump straight back into the database as root.
pub async fn restore_dump(
    runner: &dyn CommandRunner,
    host: &str,
    port: u16,
    root_password: Option<&str>,
    dump: &Path,
) -> Result<()> {
    let mut command = "mysql -u root".to_string();
    if let Some(password) = root_password {
        command.push_str(&format!(" -p{}", escape(password.into())));
    }
    command.push_str(&format!(
        " --host {} --port {} {} < {}",
        host,
        port,
        MGMT_DATABASE,
        escape(dump.to_string_lossy())
    ));
    run_checked(runner, &command).await?;
    Ok(())
}

/// Quick `select 1` to validate root credentials before a restore.
pub async fn check_root_connectivity(
    runner: &dyn CommandRunner,
    host: &str,
    port: u16,
    root_password: Option<&str>,
) -> Result<()> {
    let mut command = "mysql -u root".to_string();
    if let Some(password) = root_password {
        command.push_str(&format!(" -p{}", escape(password.into())));
    }
    command.push_str(&format!(r#" --host {} --port {} -e "select 1""#, host, port));
    runner.run(&command).await.and_then(|output| {
        if output.success() {
            Ok(())
        } else {
            Err(Error::Config(
                "failed to connect to the database as root; if the root user has a password, pass it with --root-password"
                    .to_string(),
            ))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiple_vertical_rows() {
        let output = "\
*************************** 1. row ***************************
hostname: 10.0.0.5
heartbeat: 2024-03-01 10:00:00
*************************** 2. row ***************************
hostname: 10.0.0.6
heartbeat: 2024-03-01 10:00:03
";
        let rows = parse_vertical_output("select ...", output).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["hostname"], "10.0.0.5");
        assert_eq!(rows[1]["heartbeat"], "2024-03-01 10:00:03");
    }

    #[test]
    fn empty_output_is_zero_rows() {
        assert!(parse_vertical_output("select ...", "  \n").unwrap().is_empty());
    }

    #[test]
    fn values_containing_colons_survive() {
        let output = "\
*************************** 1. row ***************************
heartbeat: 2024-03-01 10:00:00
";
        let rows = parse_vertical_output("select ...", output).unwrap();
        assert_eq!(rows[0]["heartbeat"], "2024-03-01 10:00:00");
    }

    #[test]
    fn garbage_before_first_row_marker_is_an_error() {
        let output = "unexpected banner\n*************************** 1. row ***************************\nk: v\n";
        assert!(parse_vertical_output("select ...", output).is_err());
    }

    #[test]
    fn client_args_omit_password_flag_when_unset() {
        let portal = DatabasePortal {
            host: "db".to_string(),
            port: 3306,
            user: "stack".to_string(),
            password: None,
        };
        let args = mysql_client_args(&portal);
        assert!(!args.contains("-p"));
        assert!(args.contains("--host db --port 3306"));

        let with_pw = DatabasePortal {
            password: Some("s3cret".to_string()),
            ..portal
        };
        assert!(mysql_client_args(&with_pw).contains("-ps3cret"));
    }
}
