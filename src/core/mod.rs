//! Runtime core: bootstrap and lifecycle.
//!
//! - [`Daemon`] wires the bus, subscribers, supervised processes, orchestrator and scheduler
//! - [`DaemonBuilder`] configures it
//! - `shutdown` waits for OS termination signals

mod builder;
mod daemon;
mod shutdown;

pub use builder::DaemonBuilder;
pub use daemon::{DEFAULT_SERVER_PORT, Daemon};
