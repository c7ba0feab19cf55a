//! # serverkeeper
//!
//! Keeps a game server (and optionally its protocol proxy) running as supervised
//! child processes, and moves it through a catalog of versions on a weekly schedule.
//!
//! ## Architecture
//! ```text
//!                        ┌──────────────────────────────────────────┐
//!                        │ Daemon                                   │
//!                        │  - Bus (broadcast events)                │
//!                        │  - SubscriberSet (LogWriter, custom)     │
//!                        └──────┬──────────────────────────┬────────┘
//!                               ▼                          ▼
//!                  ┌────────────────────────┐   ┌────────────────────┐
//!                  │ UpdateScheduler        │   │ SupervisedProcess  │ server
//!                  │  gate: days/weekday/hr │   │  worker: restart   │
//!                  └──────────┬─────────────┘   │  loop + backoff    │
//!                             ▼ Upgrade         └────────────────────┘
//!                  ┌────────────────────────┐   ┌────────────────────┐
//!                  │ Upgrader               │──►│ SupervisedProcess  │ proxy
//!                  │  MigrationOrchestrator │   └────────────────────┘
//!                  └──────────┬─────────────┘
//!                             ▼
//!            VersionStore (current.txt, servers/)   OverlayApplier   WebhookNotifier
//! ```
//!
//! ### Migration
//! ```text
//! next version → stop proxy, server → current/ → old/ → new current/ (+ world/)
//!   → server.jar + eula → bounded generation run (timeout = success)
//!   → overlay → commit record → start server, retarget + start proxy → notify
//! ```
//!
//! ## Key types
//! | Area           | Types                                                            |
//! |----------------|------------------------------------------------------------------|
//! | **Processes**  | [`SupervisedProcess`], [`Launch`], [`ServerLaunch`], [`ProxyLaunch`], [`CommandLaunch`] |
//! | **Policies**   | [`RestartPolicy`], [`BackoffPolicy`], [`JitterPolicy`]           |
//! | **Versions**   | [`Version`], [`VersionStore`], [`ActiveVersionRecord`]           |
//! | **Migration**  | [`MigrationOrchestrator`], [`OverlayApplier`], [`Notify`], [`Upgrader`] |
//! | **Scheduling** | [`UpdateScheduler`], [`UpdateGate`], [`Clock`], [`Upgrade`]      |
//! | **Events**     | [`Bus`], [`Event`], [`EventKind`], [`Subscribe`], [`LogWriter`]  |
//! | **Config**     | [`Config`], [`Layout`], [`Settings`]                             |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use serverkeeper::{Daemon, Layout, LogWriter, Subscribe};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), serverkeeper::RuntimeError> {
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!     Daemon::builder(Layout::new("/srv/minecraft"))
//!         .with_subscribers(subs)
//!         .build()
//!         .run()
//!         .await
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod migration;
mod policies;
mod process;
mod scheduler;
mod settings;
mod subscribers;
mod version;

// ---- Public re-exports ----

pub use config::{Config, DEFAULT_BUS_CAPACITY, Layout};
pub use crate::core::{DEFAULT_SERVER_PORT, Daemon, DaemonBuilder};
pub use error::{
    ConfigError, MigrationError, OverlayError, ProcessError, RuntimeError, SchedulerError,
    StoreError,
};
pub use events::{Bus, Event, EventKind};
pub use migration::{
    MigrationOrchestrator, MigrationOutcome, Notify, OverlayApplier, OverlayReport, Upgrader,
    WebhookNotifier, rewrite_first_line,
};
pub use policies::{BackoffPolicy, DEFAULT_RESTART_DELAY, JitterPolicy, RestartPolicy};
pub use process::{
    CommandLaunch, Launch, ProcessPolicy, ProcessState, ProxyLaunch, ServerLaunch,
    SupervisedProcess,
};
pub use scheduler::{Clock, Slot, SystemClock, Tick, UpdateGate, UpdateScheduler, Upgrade};
pub use settings::Settings;
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use version::{ActiveVersionRecord, Version, VersionStore, successor};
