//! Service identity and lifecycle control.

mod controller;

pub use controller::ServiceController;

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Which tier of the deployment a service belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Database,
    Broker,
    TimeseriesStore,
    AppNode,
    Ui,
}

/// Observable state of one service.
///
/// `Zombie` means the process exists but its protocol-level probe fails;
/// `Unknown` means probing itself errored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Stopped,
    Starting,
    Running,
    Zombie,
    Unknown,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeState::Stopped => "Stopped",
            NodeState::Starting => "Starting",
            NodeState::Running => "Running",
            NodeState::Zombie => "Zombie",
            NodeState::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Immutable description of one logical service: how to start and stop it
/// and how to recognize its process.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub name: String,
    pub kind: ServiceKind,
    pub start_command: String,
    pub stop_command: String,
    /// Token matched against process command lines for discovery.
    pub process_token: String,
    /// Optional pid file consulted when the command-line scan misses.
    pub pid_file: Option<PathBuf>,
}

impl ServiceDescriptor {
    pub fn new(
        name: impl Into<String>,
        kind: ServiceKind,
        start_command: impl Into<String>,
        stop_command: impl Into<String>,
        process_token: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            start_command: start_command.into(),
            stop_command: stop_command.into(),
            process_token: process_token.into(),
            pid_file: None,
        }
    }

    pub fn with_pid_file(mut self, path: PathBuf) -> Self {
        self.pid_file = Some(path);
        self
    }
}

/// A TCP endpoint a service requires to be reachable before it starts.
#[derive(Debug, Clone)]
pub struct DependencyEndpoint {
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl DependencyEndpoint {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
        }
    }
}
