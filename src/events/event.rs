//! # Runtime events emitted by process workers, the orchestrator and the scheduler.
//!
//! [`EventKind`] classifies events into four groups:
//! - **Process events**: launch, exit, crash, backoff, stop/kill/join
//! - **Migration events**: the steps of one version transition
//! - **Scheduler events**: update checks, shutdown
//! - **Delivery events**: notification and subscriber faults
//!
//! [`Event`] carries optional metadata (process name, attempt, exit code, delay,
//! version, reason). Each event gets a global monotonic `seq`.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use serverkeeper::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ProcessCrashed)
//!     .with_process("server")
//!     .with_attempt(3)
//!     .with_exit_code(Some(137));
//!
//! assert_eq!(ev.kind, EventKind::ProcessCrashed);
//! assert_eq!(ev.process.as_deref(), Some("server"));
//! assert_eq!(ev.exit_code, Some(137));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Process events ===
    /// A launch attempt is starting. Sets `process`, `attempt`.
    ProcessStarting,
    /// The child was spawned. Sets `process`, `attempt`, `pid`.
    ProcessSpawned,
    /// The child exited with code 0. Sets `process`, `attempt`, `exit_code`.
    ProcessExited,
    /// The child exited nonzero or by signal. Sets `process`, `attempt`, `exit_code` (if any).
    ProcessCrashed,
    /// The attempt failed before or while waiting (spawn error, panic). Sets `process`, `attempt`, `reason`.
    ProcessFailed,
    /// Next launch scheduled. Sets `process`, `attempt`, `delay_ms`.
    BackoffScheduled,
    /// Restart policy ended supervision. Sets `process`, `attempt`.
    SupervisionEnded,
    /// `start()` called while a worker is active. Sets `process`.
    StartIgnored,
    /// A supervising worker was spawned. Sets `process`.
    WorkerStarted,
    /// `stop()` called. Sets `process`, `timeout_ms`.
    StopRequested,
    /// The child exited within the grace period after termination. Sets `process`.
    ProcessTerminated,
    /// The child ignored termination and was killed. Sets `process`, `timeout_ms`.
    ProcessKilled,
    /// The worker finished after a stop. Sets `process`.
    WorkerJoined,
    /// The worker did not finish within the join budget and was aborted. Sets `process`, `timeout_ms`.
    WorkerStuck,

    // === Migration events ===
    /// A transition is starting. Sets `version` (target), `reason` (from).
    MigrationStarted,
    /// Nothing newer is cataloged. Sets `version` (current).
    NoUpgradeAvailable,
    /// A best-effort step failed; the migration continues. Sets `reason`.
    MigrationStepFailed,
    /// The bounded generation run finished. Sets `version`, `reason` (how it ended).
    ConfigGenerated,
    /// The overlay was written. Sets `version`, `reason` (applied/dropped counts).
    OverlayApplied,
    /// The active version record was committed. Sets `version`.
    VersionCommitted,
    /// The transition completed. Sets `version`.
    MigrationCompleted,
    /// The transition aborted. Sets `reason`.
    MigrationAborted,

    // === Scheduler events ===
    /// The gate opened and a migration is being triggered.
    UpdateTriggered,
    /// One scheduler tick failed. Sets `reason`.
    UpdateCheckFailed,
    /// An OS termination signal arrived; the daemon is winding down.
    ShutdownRequested,

    // === Delivery events ===
    /// The outbound notification could not be delivered. Sets `reason`.
    NotificationFailed,
    /// A subscriber panicked while handling an event. Sets `process` (subscriber name), `reason`.
    SubscriberPanicked,
    /// A subscriber queue was full or closed. Sets `process` (subscriber name), `reason`.
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the supervised process (or subscriber), if applicable.
    pub process: Option<Arc<str>>,
    /// Launch attempt (starting from 1, per worker).
    pub attempt: Option<u32>,
    /// OS process id of the child.
    pub pid: Option<u32>,
    /// Exit code, when the OS reported one.
    pub exit_code: Option<i32>,
    /// Delay before the next launch in milliseconds.
    pub delay_ms: Option<u32>,
    /// Timeout involved in a stop/kill/join in milliseconds.
    pub timeout_ms: Option<u32>,
    /// Version involved in a migration step (`MAJOR.MINOR.PATCH`).
    pub version: Option<Arc<str>>,
    /// Human-readable reason (errors, details).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            process: None,
            attempt: None,
            pid: None,
            exit_code: None,
            delay_ms: None,
            timeout_ms: None,
            version: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_process(mut self, name: impl Into<Arc<str>>) -> Self {
        self.process = Some(name.into());
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    #[inline]
    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    #[inline]
    pub fn with_exit_code(mut self, code: Option<i32>) -> Self {
        self.exit_code = code;
        self
    }

    /// Attaches a delay (stored as milliseconds, saturating).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(millis(d));
        self
    }

    /// Attaches a timeout (stored as milliseconds, saturating).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(millis(d));
        self
    }

    #[inline]
    pub fn with_version(mut self, version: impl ToString) -> Self {
        self.version = Some(version.to_string().into());
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_process(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_process(subscriber)
            .with_reason(info)
    }
}

fn millis(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::ProcessStarting);
        let b = Event::new(EventKind::ProcessStarting);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_durations_saturate() {
        let ev = Event::new(EventKind::WorkerStuck).with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }
}
