//! # Jitter for restart delays.
//!
//! [`JitterPolicy`] spreads relaunches of processes that crash together
//! (e.g. server and proxy losing the same host resource).
//!
//! - [`JitterPolicy::None`] exact delay (default)
//! - [`JitterPolicy::Full`] random in `[0, delay]`
//! - [`JitterPolicy::Equal`] `delay/2 + random[0, delay/2]`
//! - [`JitterPolicy::Decorrelated`] random in `[base, prev × 3]`, capped at max

use rand::Rng;
use std::time::Duration;

/// Randomization strategy applied to a computed restart delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Exact delay.
    #[default]
    None,
    /// Random delay in `[0, delay]`.
    Full,
    /// `delay/2 + random[0, delay/2]`.
    Equal,
    /// Random delay in `[base, prev × 3]`, capped at max.
    ///
    /// Needs context; see [`apply_decorrelated`](Self::apply_decorrelated).
    Decorrelated,
}

impl JitterPolicy {
    /// Applies jitter to `delay`.
    ///
    /// `Decorrelated` returns `delay` unchanged here.
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterPolicy::None | JitterPolicy::Decorrelated => delay,
            JitterPolicy::Full => full(delay),
            JitterPolicy::Equal => equal(delay),
        }
    }

    /// Applies decorrelated jitter; other policies fall back to [`apply`](Self::apply).
    pub fn apply_decorrelated(&self, base: Duration, prev: Duration, max: Duration) -> Duration {
        if !matches!(self, JitterPolicy::Decorrelated) {
            return self.apply(prev);
        }

        let base_ms = base.as_millis() as u64;
        let upper = (prev.as_millis() as u64)
            .saturating_mul(3)
            .min(max.as_millis() as u64)
            .max(base_ms);

        if base_ms >= upper {
            return base;
        }
        Duration::from_millis(rand::rng().random_range(base_ms..=upper))
    }
}

fn full(delay: Duration) -> Duration {
    let ms = delay.as_millis() as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=ms))
}

fn equal(delay: Duration) -> Duration {
    let half = delay.as_millis() as u64 / 2;
    if half == 0 {
        return delay;
    }
    Duration::from_millis(half + rand::rng().random_range(0..=half))
}
