//! # SupervisedProcess: controller handle for one keep-alive process.
//!
//! Owns at most one worker task at a time. The worker owns the child; the
//! controller only talks to it through a [`StopSignal`] and reads the pid slot.
//!
//! ```text
//! start() ──► spawn ProcessWorker (fresh StopSignal) ──► WorkerStarted
//!         └─► worker active → StartIgnored
//!
//! stop(t) ──► StopRequested ──► signal.request(t)
//!         ├─► join worker within 2×t → WorkerJoined
//!         └─► join budget elapsed    → abort worker → WorkerStuck
//! ```
//!
//! ## Rules
//! - `start` and `stop` are idempotent.
//! - After `stop` returns no child of this handle is alive.
//! - Dropping the handle aborts the worker; the child is killed with it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;

use crate::config::Config;
use crate::events::{Bus, Event, EventKind};
use crate::policies::{BackoffPolicy, RestartPolicy};
use crate::process::launch::Launch;
use crate::process::signal::StopSignal;
use crate::process::worker::ProcessWorker;

/// Relaunch parameters of a supervised process.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessPolicy {
    /// When to relaunch.
    pub restart: RestartPolicy,
    /// How long to wait before relaunching.
    pub backoff: BackoffPolicy,
}

impl From<&Config> for ProcessPolicy {
    fn from(cfg: &Config) -> Self {
        Self {
            restart: cfg.restart,
            backoff: cfg.backoff,
        }
    }
}

/// Snapshot of a supervised process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessState {
    /// `start` was called more recently than `stop`.
    pub desired_running: bool,
    /// Pid of the running child, if any.
    pub pid: Option<u32>,
    /// A worker task is alive.
    pub worker_active: bool,
    /// The current worker has been asked to stop.
    pub stop_requested: bool,
}

struct Worker {
    stop: Arc<StopSignal>,
    join: JoinHandle<()>,
}

/// Keeps one external program running until told to stop.
pub struct SupervisedProcess {
    launch: Arc<dyn Launch>,
    policy: ProcessPolicy,
    bus: Bus,
    pid: Arc<AtomicU32>,
    desired_running: bool,
    worker: Option<Worker>,
}

impl SupervisedProcess {
    pub fn new(launch: Arc<dyn Launch>, policy: ProcessPolicy, bus: Bus) -> Self {
        Self {
            launch,
            policy,
            bus,
            pid: Arc::new(AtomicU32::new(0)),
            desired_running: false,
            worker: None,
        }
    }

    pub fn name(&self) -> &str {
        self.launch.name()
    }

    /// Begins supervision. No-op (publishes `StartIgnored`) while a worker is active.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        self.desired_running = true;
        if self.is_worker_active() {
            self.bus
                .publish(Event::new(EventKind::StartIgnored).with_process(self.name()));
            return;
        }

        let stop = Arc::new(StopSignal::new());
        let worker = ProcessWorker {
            launch: Arc::clone(&self.launch),
            policy: self.policy,
            bus: self.bus.clone(),
            stop: Arc::clone(&stop),
            pid: Arc::clone(&self.pid),
        };
        let join = tokio::spawn(worker.run());
        self.worker = Some(Worker { stop, join });
        self.bus
            .publish(Event::new(EventKind::WorkerStarted).with_process(self.name()));
    }

    /// Ends supervision and the running child.
    ///
    /// The child gets `timeout` to exit after termination, then it is killed.
    /// The worker is joined within `2 × timeout` and aborted if it does not finish.
    pub async fn stop(&mut self, timeout: Duration) {
        self.desired_running = false;
        let Some(Worker { stop, mut join }) = self.worker.take() else {
            self.pid.store(0, Ordering::Release);
            return;
        };

        self.bus.publish(
            Event::new(EventKind::StopRequested)
                .with_process(self.name())
                .with_timeout(timeout),
        );
        stop.request(timeout);

        let budget = timeout.saturating_mul(2);
        match time::timeout(budget, &mut join).await {
            Ok(_) => self
                .bus
                .publish(Event::new(EventKind::WorkerJoined).with_process(self.name())),
            Err(_elapsed) => {
                join.abort();
                let _ = join.await;
                self.bus.publish(
                    Event::new(EventKind::WorkerStuck)
                        .with_process(self.name())
                        .with_timeout(budget),
                );
            }
        }
        self.pid.store(0, Ordering::Release);
    }

    /// Changes the parameters of the next launch (e.g. the proxy target version).
    pub fn set_target(&self, target: &str) {
        self.launch.set_target(target);
    }

    /// Pid of the running child, if any.
    pub fn pid(&self) -> Option<u32> {
        match self.pid.load(Ordering::Acquire) {
            0 => None,
            pid => Some(pid),
        }
    }

    pub fn is_worker_active(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.join.is_finished())
    }

    pub fn state(&self) -> ProcessState {
        ProcessState {
            desired_running: self.desired_running,
            pid: self.pid(),
            worker_active: self.is_worker_active(),
            stop_requested: self.worker.as_ref().is_some_and(|w| w.stop.is_requested()),
        }
    }
}

impl Drop for SupervisedProcess {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.join.abort();
        }
    }
}
