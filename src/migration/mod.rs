//! # Version migration.
//!
//! - [`MigrationOrchestrator`] one bounded transition to the next cataloged version
//! - [`OverlayApplier`] version-aware `properties.json` → `server.properties`
//! - [`Notify`] / [`WebhookNotifier`] best-effort operator notification
//! - [`Upgrader`] orchestrator + the processes it stops and restarts

mod notify;
mod orchestrator;
mod overlay;
mod upgrader;

pub use notify::{Notify, WebhookNotifier};
pub use orchestrator::{MigrationOrchestrator, MigrationOutcome};
pub use overlay::{OverlayApplier, OverlayReport, rewrite_first_line};
pub use upgrader::Upgrader;
