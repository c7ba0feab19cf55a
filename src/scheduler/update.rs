//! # UpdateScheduler: the periodic upgrade check.
//!
//! ```text
//! loop {
//!   ├─► cancelled? → exit
//!   ├─► tick():
//!   │     settings (re-read) → gate → record → is_due(now)?
//!   │       ├─ no                  → NotDue
//!   │       ├─ slot already fired  → AlreadyFired
//!   │       └─ yes                 → UpdateTriggered → upgrade(cancel) → Triggered
//!   ├─► Err → UpdateCheckFailed (loop continues)
//!   └─► sleep(period − tick time) or cancel → exit
//! }
//! ```
//!
//! A migration runs inside the tick, so no second check can start while one is
//! in flight.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{self, Instant};
use tokio::select;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{MigrationError, SchedulerError};
use crate::events::{Bus, Event, EventKind};
use crate::migration::MigrationOutcome;
use crate::scheduler::gate::{Clock, Slot, SystemClock, UpdateGate};
use crate::settings::Settings;
use crate::version::VersionStore;

/// Whatever performs a migration when the gate opens.
#[async_trait]
pub trait Upgrade: Send {
    async fn upgrade(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<MigrationOutcome, MigrationError>;
}

/// Result of one scheduler check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    /// The gate is closed.
    NotDue,
    /// The gate is open but this hour already triggered.
    AlreadyFired,
    /// A migration ran.
    Triggered(MigrationOutcome),
}

/// Periodically checks the upgrade window and triggers the upgrader.
pub struct UpdateScheduler<U> {
    settings_path: PathBuf,
    store: VersionStore,
    upgrader: U,
    clock: Arc<dyn Clock>,
    period: Duration,
    bus: Bus,
    last_fired: Option<Slot>,
}

impl<U: Upgrade> UpdateScheduler<U> {
    pub fn new(
        settings_path: impl Into<PathBuf>,
        store: VersionStore,
        upgrader: U,
        bus: Bus,
        cfg: &Config,
    ) -> Self {
        Self {
            settings_path: settings_path.into(),
            store,
            upgrader,
            clock: Arc::new(SystemClock),
            period: cfg.check_period,
            bus,
            last_fired: None,
        }
    }

    /// Replaces the wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn upgrader(&self) -> &U {
        &self.upgrader
    }

    pub fn upgrader_mut(&mut self) -> &mut U {
        &mut self.upgrader
    }

    pub fn into_upgrader(self) -> U {
        self.upgrader
    }

    /// One check; triggers at most one migration per matching hour.
    pub async fn tick(&mut self, cancel: &CancellationToken) -> Result<Tick, SchedulerError> {
        let settings = Settings::load_or_default(&self.settings_path)?;
        let gate = UpdateGate::from_settings(&settings)?;
        let record = self.store.current()?;
        let now = self.clock.now();

        if !gate.is_due(record.activated_at, now) {
            return Ok(Tick::NotDue);
        }
        let slot = UpdateGate::slot(now);
        if self.last_fired == Some(slot) {
            return Ok(Tick::AlreadyFired);
        }
        // marked before running so a failing migration is not retried every tick
        self.last_fired = Some(slot);

        self.bus.publish(
            Event::new(EventKind::UpdateTriggered).with_version(record.version),
        );
        let outcome = self.upgrader.upgrade(cancel).await?;
        Ok(Tick::Triggered(outcome))
    }

    /// Runs checks every `check_period` until `cancel` fires.
    pub async fn run(&mut self, cancel: &CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let started = Instant::now();
            if let Err(e) = self.tick(cancel).await {
                self.bus.publish(
                    Event::new(EventKind::UpdateCheckFailed)
                        .with_reason(format!("{}: {e}", e.as_label())),
                );
            }

            let wait = self.period.saturating_sub(started.elapsed());
            select! {
                _ = time::sleep(wait) => {}
                _ = cancel.cancelled() => break,
            }
        }
    }
}
