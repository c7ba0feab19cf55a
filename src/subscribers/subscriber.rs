//! # Event subscriber trait.
//!
//! [`Subscribe`] is the extension point for reacting to runtime events
//! (logging, alerting, dashboards).
//!
//! Each subscriber gets a dedicated worker task and its own bounded queue
//! inside a [`SubscriberSet`](crate::SubscriberSet). Panics are caught and
//! reported as `EventKind::SubscriberPanicked`; a full queue drops the event
//! for that subscriber only.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use serverkeeper::{Event, EventKind, Subscribe};
//!
//! struct CrashCounter(std::sync::atomic::AtomicU32);
//!
//! #[async_trait]
//! impl Subscribe for CrashCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::ProcessCrashed {
//!             self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "crash-counter" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Event subscriber.
///
/// ### Implementation requirements
/// - Avoid blocking the executor.
/// - Handle errors internally.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event. Events arrive in FIFO order per subscriber.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow/panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred queue capacity (clamped to at least 1). Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
