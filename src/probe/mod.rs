//! Readiness probing.
//!
//! - `poll` - the deadline-bounded poll-and-sleep loop everything waits with
//! - `tcp` - single-shot TCP reachability / port-listen checks
//! - `api` - the management node's protocol-level liveness RPC

mod api;
mod poll;
mod tcp;

pub use api::{ApiReadiness, ApiReadinessProbe, MGMT_API_PORT};
pub use poll::wait_until;
pub use tcp::{port_listening, tcp_reachable};

use crate::error::Result;
use async_trait::async_trait;

/// A protocol-level check confirming a service is able to serve requests,
/// not merely running.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// `Ok(true)` = serving, `Ok(false)` = not serving, `Err` = the probe
    /// itself could not determine anything.
    async fn check(&self) -> Result<bool>;
}
