//! Dependency-ordered start/stop across the whole deployment.

use crate::error::Result;
use crate::output::UserOutput;
use async_trait::async_trait;

/// One service the topology controller knows how to drive.
///
/// `installed` consults the member's install marker; a member that is not
/// installed is skipped, never failed.
#[async_trait]
pub trait TopologyMember: Send + Sync {
    fn name(&self) -> &str;
    fn installed(&self) -> bool;
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
}

/// Summary of one topology sweep.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TopologyReport {
    pub succeeded: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

/// Orders start/stop across the deployment's services.
///
/// Members are held in start order (the broker and database are assumed
/// externally managed and are not members). Steps are independent: a
/// failure is logged and the remaining steps still execute; a partial
/// stop is more useful than an aborted one.
pub struct TopologyController {
    members: Vec<Box<dyn TopologyMember>>,
}

impl TopologyController {
    pub fn new(members: Vec<Box<dyn TopologyMember>>) -> Self {
        Self { members }
    }

    /// Start every installed member in dependency order.
    pub async fn start_all(&self, output: &dyn UserOutput) -> TopologyReport {
        let mut report = TopologyReport::default();
        for member in &self.members {
            self.drive(member.as_ref(), true, output, &mut report).await;
        }
        report
    }

    /// Stop every installed member in reverse dependency order.
    pub async fn stop_all(&self, output: &dyn UserOutput) -> TopologyReport {
        let mut report = TopologyReport::default();
        for member in self.members.iter().rev() {
            self.drive(member.as_ref(), false, output, &mut report).await;
        }
        report
    }

    async fn drive(
        &self,
        member: &dyn TopologyMember,
        starting: bool,
        output: &dyn UserOutput,
        report: &mut TopologyReport,
    ) {
        let verb = if starting { "Starting" } else { "Stopping" };
        if !member.installed() {
            output.status(&format!(
                "skip {} {}, it is not installed",
                verb.to_lowercase(),
                member.name()
            ));
            report.skipped.push(member.name().to_string());
            return;
        }

        output.status(&format!(
            "{} {}, it may take a few minutes...",
            verb,
            member.name()
        ));
        let result = if starting {
            member.start().await
        } else {
            member.stop().await
        };
        match result {
            Ok(()) => report.succeeded.push(member.name().to_string()),
            Err(e) => {
                tracing::error!("{} {} failed: {}", verb.to_lowercase(), member.name(), e);
                output.warning(&format!("failed to {} {}: {}",
                    if starting { "start" } else { "stop" },
                    member.name(),
                    e
                ));
                report.failed.push(member.name().to_string());
            }
        }
    }
}
