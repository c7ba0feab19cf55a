//! # LogWriter: renders events as `tracing` records.
//!
//! Severity follows the event: crashes, kills, stuck workers and aborted
//! migrations are `warn`/`error`; routine transitions are `info`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO  process starting process="server" attempt=1
//! WARN  process crashed process="server" attempt=1 exit_code=Some(1)
//! INFO  restart scheduled process="server" delay_ms=5000 after_attempt=1
//! INFO  migration completed version="1.16.0"
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber backed by `tracing`.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let process = e.process.as_deref().unwrap_or("-");
        let version = e.version.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::ProcessStarting => {
                info!(process, attempt = ?e.attempt, "process starting");
            }
            EventKind::ProcessSpawned => {
                debug!(process, attempt = ?e.attempt, pid = ?e.pid, "process spawned");
            }
            EventKind::ProcessExited => {
                info!(process, attempt = ?e.attempt, "process exited cleanly (code 0)");
            }
            EventKind::ProcessCrashed => {
                warn!(process, attempt = ?e.attempt, exit_code = ?e.exit_code, "process crashed");
            }
            EventKind::ProcessFailed => {
                error!(process, attempt = ?e.attempt, reason, "launch attempt failed");
            }
            EventKind::BackoffScheduled => {
                info!(process, delay_ms = ?e.delay_ms, after_attempt = ?e.attempt, "restart scheduled");
            }
            EventKind::SupervisionEnded => {
                info!(process, attempt = ?e.attempt, "restart policy ended supervision");
            }
            EventKind::StartIgnored => {
                warn!(process, "worker already running; start ignored");
            }
            EventKind::WorkerStarted => {
                info!(process, "supervising worker started");
            }
            EventKind::StopRequested => {
                info!(process, timeout_ms = ?e.timeout_ms, "stopping");
            }
            EventKind::ProcessTerminated => {
                info!(process, "process exited gracefully");
            }
            EventKind::ProcessKilled => {
                warn!(process, timeout_ms = ?e.timeout_ms, "process did not exit in time; killed");
            }
            EventKind::WorkerJoined => {
                info!(process, "worker finished cleanly");
            }
            EventKind::WorkerStuck => {
                warn!(process, timeout_ms = ?e.timeout_ms, "worker still alive after join timeout; aborted");
            }
            EventKind::MigrationStarted => {
                info!(version, from = reason, "upgrading server version");
            }
            EventKind::NoUpgradeAvailable => {
                info!(version, "no later versions are available");
            }
            EventKind::MigrationStepFailed => {
                warn!(reason, "migration step failed; continuing");
            }
            EventKind::ConfigGenerated => {
                info!(version, outcome = reason, "configuration files generated");
            }
            EventKind::OverlayApplied => {
                info!(version, detail = reason, "applied server properties");
            }
            EventKind::VersionCommitted => {
                info!(version, "set current version");
            }
            EventKind::MigrationCompleted => {
                info!(version, "migration completed");
            }
            EventKind::MigrationAborted => {
                error!(reason, "migration aborted");
            }
            EventKind::UpdateTriggered => {
                info!("update window open; triggering migration");
            }
            EventKind::UpdateCheckFailed => {
                error!(reason, "update check failed");
            }
            EventKind::ShutdownRequested => {
                info!("shutdown requested; stopping processes");
            }
            EventKind::NotificationFailed => {
                warn!(reason, "failed to send notification");
            }
            EventKind::SubscriberOverflow => {
                warn!(subscriber = process, reason, "subscriber dropped event");
            }
            EventKind::SubscriberPanicked => {
                error!(subscriber = process, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
