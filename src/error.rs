use miette::Diagnostic;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    #[diagnostic(code(stackctl::config::error))]
    Config(String),

    #[error("Cannot reach {name} at {host}:{port}")]
    #[diagnostic(
        code(stackctl::connectivity::error),
        help("Check that the service is running and that firewall rules allow the connection")
    )]
    Connectivity {
        name: String,
        host: String,
        port: u16,
    },

    #[error("Service '{service}' did not become ready within {timeout} seconds")]
    #[diagnostic(
        code(stackctl::service::startup_timeout),
        help("The service was stopped again after the failed start. Check its log file and retry with a larger --timeout")
    )]
    StartupTimeout { service: String, timeout: u64 },

    #[error("Timed out waiting for {0}")]
    #[diagnostic(code(stackctl::timeout))]
    Timeout(String),

    #[error("cannot find tool '{0}', please install it and re-run")]
    #[diagnostic(code(stackctl::tool::missing))]
    ToolMissing(String),

    #[error(
        "management nodes {0:?} are still running. Stop all of them before mutating the database.\n\
         If you are sure they have stopped, re-run this command with --force.\n\
         WARNING: the database may be corrupted if nodes are actually writing while you run with --force"
    )]
    #[diagnostic(code(stackctl::db::nodes_still_running))]
    NodesStillRunning(Vec<String>),

    #[error(
        "node '{hostname}' is still running: its heartbeat changed from {before} to {after} \
         during the grace period. Please make sure you really stopped it"
    )]
    #[diagnostic(code(stackctl::db::node_still_alive))]
    NodeStillAlive {
        hostname: String,
        before: String,
        after: String,
    },

    #[error("Backup error: {0}")]
    #[diagnostic(code(stackctl::backup::error))]
    Backup(String),

    #[error("Migration error: {0}")]
    #[diagnostic(code(stackctl::db::migration))]
    Migration(String),

    #[error("{operation} failed during the {phase} step: {source}")]
    #[diagnostic(
        code(stackctl::upgrade::failed),
        help("Nothing is rolled back automatically. The retained backup can be used for manual recovery")
    )]
    UpgradeFailed {
        operation: &'static str,
        phase: &'static str,
        /// Backup taken before any mutation, if the machine got that far.
        backup_dir: Option<PathBuf>,
        #[source]
        source: Box<Error>,
    },

    #[error(
        "failed to execute shell command: {command}\nreturn code: {code}\nstdout: {stdout}\nstderr: {stderr}"
    )]
    #[diagnostic(code(stackctl::exec::failed))]
    CommandFailed {
        command: String,
        code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("Process error: {0}")]
    #[diagnostic(code(stackctl::process::error))]
    Process(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns a helpful suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Error::Connectivity { name, host, port } => Some(format!(
                "Verify the {} endpoint with: nc -z {} {}\nAlso check the corresponding keys in the property file.",
                name, host, port
            )),
            Error::StartupTimeout { service, .. } => Some(format!(
                "Check the {} log for boot errors, then start it again with a larger --timeout.",
                service
            )),
            Error::ToolMissing(tool) => Some(format!(
                "Install '{}' with your distribution's package manager and re-run.",
                tool
            )),
            Error::NodesStillRunning(_) => Some(
                "Stop every management node with 'stackctl stop_node' (use --host for remote nodes), then retry."
                    .to_string(),
            ),
            Error::UpgradeFailed {
                backup_dir: Some(dir),
                ..
            } => Some(format!(
                "The backup is retained at {} and can be used for manual recovery.",
                dir.display()
            )),
            Error::Migration(_) => Some(
                "Unless --no-backup was given the database was dumped before migration; restore it with 'stackctl rollback_db --db-dump <file>'."
                    .to_string(),
            ),
            Error::Config(_) => Some(
                "Inspect the property file shown by 'stackctl status' and fix the named key."
                    .to_string(),
            ),
            _ => None,
        }
    }
}
