//! # ProcessWorker: keep-alive loop for one process.
//!
//! ```text
//! loop {
//!   ├─► stop requested? → break
//!   ├─► publish ProcessStarting
//!   ├─► run_once() (panics caught)
//!   │     ├─► Stopped               → break
//!   │     ├─► Exited(0)             → ProcessExited
//!   │     ├─► Exited(≠0) / signal   → ProcessCrashed
//!   │     └─► Err(spawn/wait/panic) → ProcessFailed
//!   ├─► apply RestartPolicy → SupervisionEnded + break
//!   ├─► publish BackoffScheduled
//!   └─► sleep(delay) or stop → break
//! }
//! ```
//!
//! ## Rules
//! - Attempts run sequentially; at most one child per worker.
//! - The attempt counter increases monotonically per worker.
//! - The consecutive-failure counter resets after a clean exit.
//! - A failed attempt never ends the loop by itself; only the restart policy
//!   or a stop request does.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use futures::FutureExt;
use tokio::{select, time};

use crate::error::ProcessError;
use crate::events::{Bus, Event, EventKind};
use crate::process::launch::Launch;
use crate::process::runner::{AttemptOutcome, run_once};
use crate::process::signal::StopSignal;
use crate::process::supervised::ProcessPolicy;
use crate::subscribers::panic_message;

/// Supervises one [`Launch`] until stopped or the restart policy gives up.
pub(crate) struct ProcessWorker {
    pub(crate) launch: Arc<dyn Launch>,
    pub(crate) policy: ProcessPolicy,
    pub(crate) bus: Bus,
    pub(crate) stop: Arc<StopSignal>,
    pub(crate) pid: Arc<AtomicU32>,
}

impl ProcessWorker {
    pub(crate) async fn run(self) {
        let name: Arc<str> = Arc::from(self.launch.name());
        let mut attempt: u32 = 0;
        let mut failures: u32 = 0;

        loop {
            if self.stop.is_requested() {
                break;
            }

            attempt = attempt.saturating_add(1);
            self.bus.publish(
                Event::new(EventKind::ProcessStarting)
                    .with_process(name.clone())
                    .with_attempt(attempt),
            );

            let res = AssertUnwindSafe(run_once(
                self.launch.as_ref(),
                attempt,
                &self.stop,
                &self.pid,
                &self.bus,
            ))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                self.pid.store(0, Ordering::Release);
                Err(ProcessError::Panicked {
                    info: panic_message(payload.as_ref()),
                })
            });

            let crashed = match res {
                Ok(AttemptOutcome::Stopped) => break,
                Ok(AttemptOutcome::Exited(status)) if status.success() => {
                    self.bus.publish(
                        Event::new(EventKind::ProcessExited)
                            .with_process(name.clone())
                            .with_attempt(attempt)
                            .with_exit_code(status.code()),
                    );
                    false
                }
                Ok(AttemptOutcome::Exited(status)) => {
                    self.bus.publish(
                        Event::new(EventKind::ProcessCrashed)
                            .with_process(name.clone())
                            .with_attempt(attempt)
                            .with_exit_code(status.code())
                            .with_reason(status.to_string()),
                    );
                    true
                }
                Err(e) => {
                    self.bus.publish(
                        Event::new(EventKind::ProcessFailed)
                            .with_process(name.clone())
                            .with_attempt(attempt)
                            .with_reason(e.to_string()),
                    );
                    true
                }
            };

            // the child may have exited on its own just as stop was requested
            if self.stop.is_requested() {
                break;
            }

            let relaunch = if crashed {
                self.policy.restart.after_crash()
            } else {
                self.policy.restart.after_clean_exit()
            };
            if !relaunch {
                self.bus.publish(
                    Event::new(EventKind::SupervisionEnded)
                        .with_process(name.clone())
                        .with_attempt(attempt),
                );
                break;
            }

            let delay = if crashed {
                let d = self.policy.backoff.next(failures);
                failures = failures.saturating_add(1);
                d
            } else {
                failures = 0;
                self.policy.backoff.next(0)
            };
            self.bus.publish(
                Event::new(EventKind::BackoffScheduled)
                    .with_process(name.clone())
                    .with_attempt(attempt)
                    .with_delay(delay),
            );

            select! {
                _ = time::sleep(delay) => {}
                _ = self.stop.requested() => break,
            }
        }
    }
}
