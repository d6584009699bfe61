//! CLI command implementations.
//!
//! Each module composes the core components for one command area. Every
//! command with a `--host` flag has a remote variant that re-invokes the
//! same CLI over ssh; the orchestration logic is identical, only the
//! execution channel differs.

mod config;
mod db;
mod node;
mod status;
mod topology;
mod tsdb;
mod ui;
mod upgrade;

pub use config::{run_configure, run_restore_config, run_save_config};
pub use db::{run_rollback_db, run_upgrade_db};
pub use node::{run_start_node, run_stop_node};
pub use status::run_status;
pub use topology::{run_start_all, run_stop_all};
pub use tsdb::run_tsdb;
pub use ui::{run_start_ui, run_stop_ui, run_ui_status};
pub use upgrade::{run_rollback_management_node, run_upgrade_management_node};

use crate::exec::{CommandRunner, SshRunner};

/// Re-invoke this CLI on a remote host with the given argument line,
/// streaming output back to the operator.
pub(crate) async fn reinvoke_remote(host: &str, args: &str, verbose: bool) -> anyhow::Result<()> {
    let runner = SshRunner::new(host, verbose);
    tracing::info!("running 'stackctl {}' on {}", args, host);
    let code = runner.run_streaming(&format!("stackctl {}", args)).await?;
    if code != 0 {
        anyhow::bail!(
            "remote 'stackctl {}' on {} exited with code {}",
            args,
            host,
            code
        );
    }
    Ok(())
}
