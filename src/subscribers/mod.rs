//! # Event subscribers.
//!
//! ```text
//!   worker / orchestrator ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//!                                                                       │
//!                                                              ┌────────┴────────┐
//!                                                              ▼                 ▼
//!                                                          LogWriter          custom
//! ```
//!
//! - [`Subscribe`] trait for custom handlers
//! - [`SubscriberSet`] per-subscriber queues and workers
//! - [`LogWriter`] built-in `tracing` renderer

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub(crate) use set::panic_message;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
