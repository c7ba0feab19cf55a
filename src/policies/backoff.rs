//! # Restart delay policy.
//!
//! [`BackoffPolicy`] decides how long a worker waits before relaunching a process.
//! The default is a constant 5s delay (`first = max = 5s`, `factor = 1.0`), which
//! is the classic "restart delay" of a keep-alive loop. Growth and jitter are
//! available for processes that crash-loop against an external dependency.
//!
//! The delay after `n` consecutive crashes is `first × factor^n`, clamped to `max`,
//! then jittered. The base never depends on a previously jittered value.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use serverkeeper::{BackoffPolicy, JitterPolicy};
//!
//! let fixed = BackoffPolicy::constant(Duration::from_secs(5));
//! assert_eq!(fixed.next(0), Duration::from_secs(5));
//! assert_eq!(fixed.next(7), Duration::from_secs(5));
//!
//! let growing = BackoffPolicy {
//!     first: Duration::from_secs(1),
//!     max: Duration::from_secs(60),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//! assert_eq!(growing.next(3), Duration::from_secs(8));
//! assert_eq!(growing.next(10), Duration::from_secs(60));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Default delay between an exit and the next launch.
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(5);

/// Restart delay policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first relaunch (and after every clean exit).
    pub first: Duration,
    /// Upper bound for the delay.
    pub max: Duration,
    /// Multiplicative growth per consecutive crash (`1.0` = constant).
    pub factor: f64,
    /// Randomization applied to the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Constant [`DEFAULT_RESTART_DELAY`] without jitter.
    fn default() -> Self {
        Self::constant(DEFAULT_RESTART_DELAY)
    }
}

impl BackoffPolicy {
    /// A policy that always waits exactly `delay`.
    pub const fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the delay after `failures` consecutive crashes (0-indexed).
    ///
    /// Non-finite or negative intermediate values clamp to [`BackoffPolicy::max`].
    pub fn next(&self, failures: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = failures.min(i32::MAX as u32) as i32;
        let unclamped = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !unclamped.is_finite() || unclamped < 0.0 || unclamped > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(unclamped)
        };

        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            _ => self.jitter.apply(base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_constant_restart_delay() {
        let policy = BackoffPolicy::default();
        for failures in 0..20 {
            assert_eq!(policy.next(failures), DEFAULT_RESTART_DELAY);
        }
    }

    #[test]
    fn test_doubling_restart_delay_caps_at_a_minute() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(2),
            max: Duration::from_secs(60),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        let delays: Vec<u64> = (0..7).map(|n| policy.next(n).as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 8, 16, 32, 60, 60]);
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_first_delay_above_cap_uses_cap() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(30),
            max: Duration::from_secs(3),
            factor: 1.5,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(0), Duration::from_secs(3));
        assert_eq!(policy.next(8), Duration::from_secs(3));
    }

    #[test]
    fn test_equal_jitter_stays_within_half_and_base() {
        let policy = BackoffPolicy {
            jitter: JitterPolicy::Equal,
            ..BackoffPolicy::constant(Duration::from_secs(2))
        };
        for failures in 0..50 {
            let delay = policy.next(failures);
            assert!(delay >= Duration::from_secs(1), "{delay:?} below half");
            assert!(delay <= Duration::from_secs(2), "{delay:?} above base");
        }
    }
}
