//! # Supervised external processes.
//!
//! - [`Launch`] describes the command line of a process ([`ServerLaunch`], [`ProxyLaunch`], [`CommandLaunch`])
//! - [`SupervisedProcess`] the controller handle: `start` / `stop` / `set_target` / `pid`
//! - `worker` the keep-alive loop, `runner` one attempt, `signal` stop + termination
//!
//! ```text
//! SupervisedProcess ──start──► ProcessWorker::run ──► run_once ──► Child
//!        │                         ▲                      │
//!        └──stop(t)── StopSignal ──┴──────────────────────┘ terminate / kill
//! ```

mod launch;
mod runner;
mod signal;
mod supervised;
mod worker;

pub use launch::{CommandLaunch, Launch, ProxyLaunch, ServerLaunch};
pub use supervised::{ProcessPolicy, ProcessState, SupervisedProcess};
