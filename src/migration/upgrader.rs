//! [`Upgrader`]: the orchestrator bundled with the processes it brackets.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::MigrationError;
use crate::migration::orchestrator::{MigrationOrchestrator, MigrationOutcome};
use crate::process::SupervisedProcess;
use crate::scheduler::Upgrade;

/// Owns the supervised server and proxy together with the orchestrator that
/// stops and restarts them around a migration.
pub struct Upgrader {
    orchestrator: MigrationOrchestrator,
    server: Option<SupervisedProcess>,
    proxy: Option<SupervisedProcess>,
}

impl Upgrader {
    pub fn new(
        orchestrator: MigrationOrchestrator,
        server: Option<SupervisedProcess>,
        proxy: Option<SupervisedProcess>,
    ) -> Self {
        Self {
            orchestrator,
            server,
            proxy,
        }
    }

    pub fn orchestrator(&self) -> &MigrationOrchestrator {
        &self.orchestrator
    }

    pub fn server(&self) -> Option<&SupervisedProcess> {
        self.server.as_ref()
    }

    pub fn proxy(&self) -> Option<&SupervisedProcess> {
        self.proxy.as_ref()
    }

    /// Stops the proxy, then the server.
    pub async fn shutdown(&mut self, timeout: Duration) {
        if let Some(p) = self.proxy.as_mut() {
            p.stop(timeout).await;
        }
        if let Some(p) = self.server.as_mut() {
            p.stop(timeout).await;
        }
    }
}

#[async_trait]
impl Upgrade for Upgrader {
    async fn upgrade(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<MigrationOutcome, MigrationError> {
        self.orchestrator
            .migrate(self.server.as_mut(), self.proxy.as_mut(), cancel)
            .await
    }
}
