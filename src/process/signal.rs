//! Stop signalling between a controller and its worker, and child termination.

use std::io;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::process::Child;
use tokio::time;
use tokio_util::sync::CancellationToken;

/// One-shot stop request carrying the grace period for the child.
///
/// Set by the controller, observed by the worker. A fresh signal is created
/// for every worker, so a stopped process can be started again.
#[derive(Debug, Default)]
pub(crate) struct StopSignal {
    token: CancellationToken,
    grace_ms: AtomicU64,
}

impl StopSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Requests a stop; the child gets `grace` to exit after termination.
    pub(crate) fn request(&self, grace: Duration) {
        let ms = grace.as_millis().min(u128::from(u64::MAX)) as u64;
        self.grace_ms.store(ms, Ordering::Release);
        self.token.cancel();
    }

    pub(crate) fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms.load(Ordering::Acquire))
    }

    /// Completes once [`request`](Self::request) has been called.
    pub(crate) async fn requested(&self) {
        self.token.cancelled().await
    }
}

/// How a child ended after a stop request.
#[derive(Debug)]
pub(crate) enum Shutdown {
    /// Exited within the grace period.
    Graceful(Option<ExitStatus>),
    /// Killed after the grace period elapsed.
    Killed,
}

/// Asks the child to exit: `SIGTERM` on unix, a hard kill elsewhere.
pub(crate) fn terminate(child: &mut Child) -> io::Result<()> {
    #[cfg(unix)]
    {
        let Some(pid) = child.id() else {
            return Ok(());
        };
        // SAFETY: plain syscall on a pid we spawned and have not reaped yet.
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
    #[cfg(not(unix))]
    {
        child.start_kill()
    }
}

/// Terminates the child, waits up to `grace`, then kills and reaps it.
pub(crate) async fn shutdown_child(child: &mut Child, grace: Duration) -> Shutdown {
    if let Err(e) = terminate(child) {
        tracing::debug!(error = %e, "terminate failed; child probably gone");
    }
    match time::timeout(grace, child.wait()).await {
        Ok(status) => Shutdown::Graceful(status.ok()),
        Err(_elapsed) => {
            // kill() also waits, so the child is reaped here.
            if let Err(e) = child.kill().await {
                tracing::debug!(error = %e, "kill failed");
            }
            Shutdown::Killed
        }
    }
}
