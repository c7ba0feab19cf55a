//! Restart and delay policies for supervised processes.
//!
//! ## Contents
//! - [`RestartPolicy`] whether to relaunch after a clean exit / crash
//! - [`BackoffPolicy`] how long to wait before relaunching (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization of that wait
//!
//! ## Quick wiring
//! ```text
//! ProcessPolicy { restart, backoff }
//!      └─► process::worker uses:
//!           - restart to decide relaunch/exit
//!           - backoff.next(consecutive_failures) to schedule the next launch
//! ```
//!
//! ## Defaults
//! - `RestartPolicy::Always` (clean exits are relaunched too).
//! - `BackoffPolicy::default()` → constant 5s, no jitter.

mod backoff;
mod jitter;
mod restart;

pub use backoff::{BackoffPolicy, DEFAULT_RESTART_DELAY};
pub use jitter::JitterPolicy;
pub use restart::RestartPolicy;
