//! Upgrade window gating and the wall clock it reads.

use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Timelike, Utc, Weekday};

use crate::error::ConfigError;
use crate::settings::Settings;

/// Source of the current UTC time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// One matching hour: the unit the scheduler fires at most once per.
pub type Slot = (NaiveDate, u32);

/// When an upgrade is due.
///
/// All of the following must hold at the instant of a check:
/// - at least `frequency` has passed since the last activation;
/// - today (UTC) is `weekday`;
/// - the current UTC hour equals `hour` exactly.
///
/// A check that misses the hour skips the window until the next matching day.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateGate {
    pub frequency: TimeDelta,
    pub weekday: Weekday,
    pub hour: u32,
}

impl UpdateGate {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            frequency: settings.update_frequency(),
            weekday: settings.weekday()?,
            hour: settings.update_hour()?,
        })
    }

    pub fn is_due(&self, last_activation: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(last_activation) >= self.frequency
            && now.weekday() == self.weekday
            && now.hour() == self.hour
    }

    /// The slot `now` falls in.
    pub fn slot(now: DateTime<Utc>) -> Slot {
        (now.date_naive(), now.hour())
    }
}
