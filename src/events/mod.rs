//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: process workers, `SupervisedProcess`, `MigrationOrchestrator`,
//!   `UpdateScheduler`, notifier, `SubscriberSet` workers (panic/overflow).
//! - **Consumers**: the daemon listener task, which fans out to a `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
