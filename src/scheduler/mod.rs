//! # Upgrade scheduling.
//!
//! - [`UpdateScheduler`] periodic check, cancellable between ticks and inside migrations
//! - [`UpdateGate`] frequency + weekday + hour window
//! - [`Clock`] / [`SystemClock`] time source
//! - [`Upgrade`] the seam a triggered check calls into

mod gate;
mod update;

pub use gate::{Clock, Slot, SystemClock, UpdateGate};
pub use update::{Tick, Upgrade, UpdateScheduler};
