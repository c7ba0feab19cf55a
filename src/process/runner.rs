//! # One launch attempt of a supervised process.
//!
//! Spawns the child described by a [`Launch`], records its pid and waits for
//! whichever comes first: the child exiting on its own, or a stop request.
//!
//! ## Event flow
//! ```text
//! spawn ok  → ProcessSpawned → exit          → Ok(Exited(status))
//!                            → stop requested → terminate → ProcessTerminated → Ok(Stopped)
//!                                                         → grace elapsed → kill → ProcessKilled → Ok(Stopped)
//! spawn err → Err(Spawn)
//! ```
//!
//! ## Rules
//! - Exit is observed by awaiting the child, not by polling.
//! - The pid slot holds the child's pid while it runs and `0` otherwise.
//! - The terminal exit/crash event is published by the worker, not here.

use std::process::ExitStatus;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::select;

use crate::error::ProcessError;
use crate::events::{Bus, Event, EventKind};
use crate::process::launch::Launch;
use crate::process::signal::{Shutdown, StopSignal, shutdown_child};

/// How one attempt ended without an error.
#[derive(Debug)]
pub(crate) enum AttemptOutcome {
    /// The child exited on its own.
    Exited(ExitStatus),
    /// The child was stopped on request.
    Stopped,
}

/// Runs a single attempt of `launch`, publishing spawn/stop events to `bus`.
pub(crate) async fn run_once(
    launch: &dyn Launch,
    attempt: u32,
    stop: &StopSignal,
    pid: &AtomicU32,
    bus: &Bus,
) -> Result<AttemptOutcome, ProcessError> {
    if stop.is_requested() {
        return Ok(AttemptOutcome::Stopped);
    }

    let mut cmd = launch.command();
    let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: cmd.as_std().get_program().to_string_lossy().into_owned(),
        source,
    })?;

    let child_pid = child.id();
    pid.store(child_pid.unwrap_or(0), Ordering::Release);
    bus.publish(
        Event::new(EventKind::ProcessSpawned)
            .with_process(launch.name())
            .with_attempt(attempt)
            .with_pid(child_pid),
    );

    let exited = select! {
        status = child.wait() => Some(status),
        _ = stop.requested() => None,
    };

    let outcome = match exited {
        Some(status) => status
            .map(AttemptOutcome::Exited)
            .map_err(|source| ProcessError::Wait { source }),
        None => {
            let grace = stop.grace();
            match shutdown_child(&mut child, grace).await {
                Shutdown::Graceful(status) => bus.publish(
                    Event::new(EventKind::ProcessTerminated)
                        .with_process(launch.name())
                        .with_attempt(attempt)
                        .with_pid(child_pid)
                        .with_exit_code(status.and_then(|s| s.code())),
                ),
                Shutdown::Killed => bus.publish(
                    Event::new(EventKind::ProcessKilled)
                        .with_process(launch.name())
                        .with_attempt(attempt)
                        .with_pid(child_pid)
                        .with_timeout(grace),
                ),
            }
            Ok(AttemptOutcome::Stopped)
        }
    };

    pid.store(0, Ordering::Release);
    outcome
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::process::launch::CommandLaunch;

    #[tokio::test]
    async fn test_exit_status_is_reported() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let stop = StopSignal::new();
        let pid = AtomicU32::new(0);
        let launch = CommandLaunch::new("exit3", "sh").arg("-c").arg("exit 3");

        let res = run_once(&launch, 1, &stop, &pid, &bus).await.unwrap();
        match res {
            AttemptOutcome::Exited(status) => assert_eq!(status.code(), Some(3)),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(pid.load(Ordering::Acquire), 0);

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::ProcessSpawned);
        assert!(ev.pid.is_some());
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let bus = Bus::new(4);
        let stop = StopSignal::new();
        let pid = AtomicU32::new(0);
        let launch = CommandLaunch::new("ghost", "/nonexistent/definitely-not-here");

        let err = run_once(&launch, 1, &stop, &pid, &bus).await.unwrap_err();
        assert_eq!(err.as_label(), "process_spawn_failed");
        assert!(err.to_string().contains("definitely-not-here"));
    }

    #[tokio::test]
    async fn test_stop_request_terminates_child() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let stop = StopSignal::new();
        let pid = AtomicU32::new(0);
        let launch = CommandLaunch::new("sleeper", "sleep").arg("30");

        let attempt = run_once(&launch, 1, &stop, &pid, &bus);
        let requester = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            stop.request(Duration::from_secs(5));
        };
        let (res, ()) = tokio::join!(attempt, requester);

        assert!(matches!(res.unwrap(), AttemptOutcome::Stopped));
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::ProcessSpawned);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::ProcessTerminated);
    }
}
