//! # Restart policies for supervised processes.
//!
//! [`RestartPolicy`] determines whether a process is relaunched after it exits.
//!
//! - [`RestartPolicy::Always`] relaunch after a clean exit **and** after a crash (default).
//! - [`RestartPolicy::OnFailure`] relaunch only after a crash; exit code 0 ends supervision.
//! - [`RestartPolicy::Never`] the process runs once.
//!
//! ## Choosing the right policy
//! ```text
//! Long-running server        → Always     (continuous uptime is the steady state)
//! Batch job that may crash   → OnFailure
//! One-shot helper            → Never
//! ```

/// Policy controlling whether a process is relaunched after it exits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Never relaunch: the process runs once.
    Never,
    /// Relaunch only after a crash (nonzero exit, signal, spawn failure).
    OnFailure,
    /// Relaunch unconditionally (default).
    #[default]
    Always,
}

impl RestartPolicy {
    /// Returns `true` if a process that exited with code 0 should be relaunched.
    #[inline]
    pub fn after_clean_exit(self) -> bool {
        matches!(self, RestartPolicy::Always)
    }

    /// Returns `true` if a crashed process should be relaunched.
    #[inline]
    pub fn after_crash(self) -> bool {
        matches!(self, RestartPolicy::Always | RestartPolicy::OnFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_restarts_on_clean_exit_and_crash() {
        let policy = RestartPolicy::default();
        assert!(policy.after_clean_exit());
        assert!(policy.after_crash());
    }

    #[test]
    fn test_on_failure_stops_after_clean_exit() {
        assert!(!RestartPolicy::OnFailure.after_clean_exit());
        assert!(RestartPolicy::OnFailure.after_crash());
        assert!(!RestartPolicy::Never.after_crash());
    }
}
