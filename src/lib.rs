//! # stackctl
//!
//! Lifecycle and upgrade orchestration for a multi-tier management stack:
//! a database, a message broker, an optional time-series store, the
//! management node itself and an optional web UI, on the local or a
//! remote host.
//!
//! ## Architecture
//!
//! The heart of the crate is the orchestration engine:
//!
//! - [`probe`] - deadline-bounded readiness polling
//! - [`service`] - idempotent start/stop/status for one service
//! - [`backup`] - write-once snapshots taken before destructive mutations
//! - [`upgrade`] - the upgrade/rollback state machines
//! - [`db`] - heartbeat-gated schema migration and dump/restore
//! - [`topology`] - dependency-ordered start/stop across services
//!
//! Everything external (shell commands, the database clients, remote
//! hosts) is reached through the [`exec::CommandRunner`] seam; remote
//! execution is the same capability over ssh, not a separate code path.
//!
//! ## Execution model
//!
//! Strictly sequential: one blocking operation at a time, bounded by its
//! own timeout. The only waiting primitive is [`probe::wait_until`], a
//! cooperative poll-and-sleep loop. An interrupt terminates the process
//! mid-step; snapshots already written stay valid, in-flight copies may
//! be partial.

pub mod backup;
pub mod commands;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod exec;
pub mod output;
pub mod privilege;
pub mod probe;
pub mod process;
pub mod service;
pub mod topology;
pub mod upgrade;

// Re-export commonly used types
pub use backup::{BackupManager, BackupRecord};
pub use context::CtlContext;
pub use error::{Error, Result};
pub use service::{NodeState, ServiceController, ServiceDescriptor, ServiceKind};
pub use topology::TopologyController;
pub use upgrade::{RollbackOrchestrator, UpgradeOrchestrator, UpgradePhase};
