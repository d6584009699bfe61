use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stackctl")]
#[command(version, about = "Operate and upgrade the management stack")]
pub struct Cli {
    /// Verbose: print execution details of every shell command
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
#[command(rename_all = "snake_case")]
pub enum Commands {
    /// Show the management node status and deployment information
    Status {
        /// SSH URL, e.g. root@192.168.0.10, to query a remote machine
        #[arg(long)]
        host: Option<String>,

        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start the management node and wait until it serves the API
    StartNode {
        /// Readiness wait in seconds
        #[arg(long, default_value_t = 300)]
        timeout: u64,

        /// SSH URL to start the node on a remote machine
        #[arg(long)]
        host: Option<String>,
    },

    /// Stop the management node
    StopNode {
        /// Skip the graceful phase and kill the process immediately
        #[arg(short, long)]
        force: bool,

        /// SSH URL to stop the node on a remote machine
        #[arg(long)]
        host: Option<String>,
    },

    /// Start every installed service in dependency order
    Start,

    /// Stop every installed service in reverse dependency order
    Stop,

    /// Upgrade the management node to a new artifact version
    UpgradeManagementNode {
        /// Path to the new artifact archive
        #[arg(long)]
        war_file: PathBuf,

        /// SSH URL to upgrade a remote machine instead
        #[arg(long)]
        host: Option<String>,
    },

    /// Roll the management node back to a previous artifact version
    RollbackManagementNode {
        /// Path to the previous artifact archive
        #[arg(long)]
        war_file: PathBuf,

        /// SSH URL to roll back a remote machine instead
        #[arg(long)]
        host: Option<String>,

        /// Property file to restore; defaults to the one saved during the rollback backup
        #[arg(long)]
        property_file: Option<PathBuf>,
    },

    /// Migrate the database schema to the version shipped with the artifact
    UpgradeDb {
        /// Bypass the running-node check. Only use it when you know exactly what it does
        #[arg(long)]
        force: bool,

        /// Skip the pre-migration database dump
        #[arg(long)]
        no_backup: bool,

        /// Only verify that the database could be upgraded
        #[arg(long)]
        dry_run: bool,
    },

    /// Restore the database from a dump taken before a failed upgrade
    RollbackDb {
        /// The previously taken dump file
        #[arg(long)]
        db_dump: PathBuf,

        /// Password of the database root user; omit for an empty password
        #[arg(long)]
        root_password: Option<String>,

        /// Bypass the running-node check. Only use it when you know exactly what it does
        #[arg(long)]
        force: bool,
    },

    /// Control the time-series store life cycle
    Tsdb {
        /// Start the store
        #[arg(long)]
        start: bool,

        /// Stop the store
        #[arg(long)]
        stop: bool,

        /// Show the store status (the default)
        #[arg(long)]
        status: bool,

        /// With --start: wait up to N seconds for the store's web port
        #[arg(long)]
        wait_timeout: Option<u64>,
    },

    /// Start the web UI server on the local or a remote host
    StartUi {
        /// SSH URL of the UI host
        #[arg(long)]
        host: Option<String>,
    },

    /// Stop the web UI server on the local or a remote host
    StopUi {
        /// SSH URL of the UI host
        #[arg(long)]
        host: Option<String>,
    },

    /// Show the web UI server status
    UiStatus {
        /// SSH URL of the UI host
        #[arg(long)]
        host: Option<String>,
    },

    /// Save the property file to a folder
    SaveConfig {
        /// Destination folder
        #[arg(long)]
        save_to: Option<PathBuf>,
    },

    /// Restore the property file from a folder or file
    RestoreConfig {
        /// Source folder or file
        #[arg(long)]
        restore_from: Option<PathBuf>,
    },

    /// Write key=value properties into the property file
    Configure {
        /// SSH URL to configure a remote machine instead
        #[arg(long)]
        host: Option<String>,

        /// Assignments in the form key=value
        #[arg(value_name = "KEY=VALUE")]
        properties: Vec<String>,
    },
}
