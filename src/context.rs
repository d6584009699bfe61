use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Default install location of the management node artifact.
pub const DEFAULT_STACK_HOME: &str = "/usr/local/stack/management";

/// Where backups, db dumps and pid files live.
pub const DEFAULT_DATA_DIR: &str = "/var/lib/stack";

/// Unix account that owns the artifact tree and the property file.
pub const DEFAULT_SERVICE_ACCOUNT: &str = "stack";

/// Explicit context passed to every component constructor.
///
/// Holds the resolved install home, the property file location, the data
/// directory for backups/dumps and the service account name. Constructed
/// once in `main`; there is no global state.
#[derive(Debug, Clone)]
pub struct CtlContext {
    home: PathBuf,
    properties_path: PathBuf,
    data_dir: PathBuf,
    service_account: String,
    verbose: bool,
}

impl CtlContext {
    /// Resolve the context from the environment.
    ///
    /// `STACK_HOME` overrides the install home; `STACK_DATA_DIR` overrides
    /// the data directory. The install home must exist: commands cannot
    /// operate on a missing installation.
    pub fn discover(verbose: bool) -> Result<Self> {
        let home = std::env::var("STACK_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STACK_HOME));

        if !home.is_dir() {
            return Err(Error::Config(format!(
                "cannot find STACK_HOME at {}; set the STACK_HOME environment variable to the install location",
                home.display()
            )));
        }

        let data_dir = std::env::var("STACK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));

        Ok(Self::new(
            home,
            data_dir,
            DEFAULT_SERVICE_ACCOUNT.to_string(),
            verbose,
        ))
    }

    /// Build a context from explicit paths (used by tests and by `discover`).
    pub fn new(home: PathBuf, data_dir: PathBuf, service_account: String, verbose: bool) -> Self {
        let properties_path = home.join("conf").join("management.properties");
        Self {
            home,
            properties_path,
            data_dir,
            service_account,
            verbose,
        }
    }

    /// Install home of the management node artifact.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Location of the flat `key=value` property file.
    pub fn properties_path(&self) -> &Path {
        &self.properties_path
    }

    /// Root directory for backups, database dumps and pid files.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Name of the unix account owning the installation.
    pub fn service_account(&self) -> &str {
        &self.service_account
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Directory that receives pre-upgrade snapshots.
    pub fn upgrade_backup_root(&self) -> PathBuf {
        self.data_dir.join("upgrade")
    }

    /// Directory that receives pre-rollback snapshots.
    pub fn rollback_backup_root(&self) -> PathBuf {
        self.data_dir.join("rollback")
    }

    /// Directory that receives database dumps.
    pub fn db_backup_root(&self) -> PathBuf {
        self.data_dir.join("db_backup")
    }

    /// Management node log file, resolved relative to the install home.
    pub fn node_log_path(&self) -> PathBuf {
        self.home.join("logs").join("management-node.log")
    }

    /// Boot-error marker written by the startup script when the node fails
    /// early; cleared before every start.
    pub fn boot_error_path(&self) -> PathBuf {
        self.data_dir.join("boot-error.log")
    }

    /// Supporting-tool installer shipped inside the artifact.
    pub fn tool_install_script(&self) -> PathBuf {
        self.home.join("tools").join("install.sh")
    }

    /// External forward-only schema migrator shipped inside the artifact.
    pub fn migrator_path(&self) -> PathBuf {
        self.home.join("tools").join("migrator").join("migrate")
    }

    /// Directory of ordered schema migration scripts.
    pub fn migration_scripts_dir(&self) -> PathBuf {
        self.home.join("db").join("upgrade")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_paths_hang_off_home_and_data_dir() {
        let ctx = CtlContext::new(
            PathBuf::from("/opt/mgmt"),
            PathBuf::from("/var/lib/mgmt"),
            "stack".to_string(),
            false,
        );
        assert_eq!(
            ctx.properties_path(),
            Path::new("/opt/mgmt/conf/management.properties")
        );
        assert_eq!(ctx.db_backup_root(), Path::new("/var/lib/mgmt/db_backup"));
        assert_eq!(
            ctx.migrator_path(),
            Path::new("/opt/mgmt/tools/migrator/migrate")
        );
    }
}
