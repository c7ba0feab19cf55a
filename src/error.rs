//! Error types used by the supervisor, the version store and the migration workflow.
//!
//! - [`ProcessError`]: failures of a single supervised launch attempt.
//! - [`StoreError`]: durable version record and catalog failures.
//! - [`OverlayError`]: configuration overlay source/target failures.
//! - [`ConfigError`]: operator settings failures.
//! - [`MigrationError`]: aborted version transitions.
//! - [`SchedulerError`]: a failed scheduler tick.
//! - [`RuntimeError`]: daemon bootstrap failures.
//!
//! Every enum provides `as_label` (a short stable snake_case label for logs/metrics).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// # Errors produced by one launch attempt of a supervised process.
///
/// All variants are treated as a crash by the worker: they are published,
/// followed by the restart backoff, and never end supervision on their own.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The executable could not be started (missing binary, bad cwd, ...).
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program that was being launched.
        program: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Waiting on the child failed.
    #[error("failed to wait for child: {source}")]
    Wait {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The launch attempt panicked; caught by the worker.
    #[error("launch attempt panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl ProcessError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use serverkeeper::ProcessError;
    ///
    /// let err = ProcessError::Panicked { info: "boom".into() };
    /// assert_eq!(err.as_label(), "process_panicked");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcessError::Spawn { .. } => "process_spawn_failed",
            ProcessError::Wait { .. } => "process_wait_failed",
            ProcessError::Panicked { .. } => "process_panicked",
        }
    }
}

/// # Errors produced by the [`VersionStore`](crate::VersionStore).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing the record or the catalog failed.
    #[error("i/o error on {path}: {source}")]
    Io {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The record exists but is not `version` + `timestamp` on two lines.
    #[error("corrupt version record {path}: {reason}")]
    CorruptState {
        /// Record location.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// A string did not match `MAJOR.MINOR[.PATCH]`.
    #[error("invalid version string {0:?}")]
    InvalidVersion(String),
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::Io { .. } => "store_io",
            StoreError::CorruptState { .. } => "store_corrupt_state",
            StoreError::InvalidVersion(_) => "store_invalid_version",
        }
    }
}

/// # Errors produced while applying a configuration overlay.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum OverlayError {
    /// Reading the overlay source or rewriting the target failed.
    #[error("i/o error on {path}: {source}")]
    Io {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The overlay document is not valid JSON.
    #[error("malformed overlay {path}: {source}")]
    Parse {
        /// Overlay source location.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },
}

impl OverlayError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            OverlayError::Io { .. } => "overlay_io",
            OverlayError::Parse { .. } => "overlay_parse",
        }
    }
}

/// # Errors produced while loading operator settings.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("cannot read settings {path}: {source}")]
    Io {
        /// Settings location.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The settings file is not valid.
    #[error("malformed settings {path}: {source}")]
    Parse {
        /// Settings location.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },

    /// `update_weekday` is not a weekday name.
    #[error("unknown update weekday {0:?}")]
    InvalidWeekday(String),

    /// `update_time_utc` is outside `0..=23`.
    #[error("update hour {0} is outside 0..=23")]
    InvalidHour(u32),
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Io { .. } => "config_io",
            ConfigError::Parse { .. } => "config_parse",
            ConfigError::InvalidWeekday(_) => "config_invalid_weekday",
            ConfigError::InvalidHour(_) => "config_invalid_hour",
        }
    }
}

/// # Errors that abort a migration.
///
/// A migration stops at the first of these; nothing already done is rolled back.
/// The backup root is left in place for operator inspection.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum MigrationError {
    /// Reading the current version, the catalog or committing the record failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The active data root could not be moved aside (often held open by another program).
    #[error("permission denied moving {path} (is the folder open in another program?)")]
    PermissionDenied {
        /// Active data root.
        path: PathBuf,
    },

    /// Moving the active data root aside failed for another OS reason.
    #[error("failed to move {from} to {to}: {source}")]
    Backup {
        /// Active data root.
        from: PathBuf,
        /// Backup root.
        to: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// A mandatory filesystem step failed.
    #[error("{step}: {source}")]
    Io {
        /// Step that failed.
        step: &'static str,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The overlay could not be applied.
    #[error(transparent)]
    Overlay(#[from] OverlayError),

    /// Cancellation was requested before `step`.
    #[error("migration cancelled before {step}")]
    Cancelled {
        /// Step that did not run.
        step: &'static str,
    },
}

impl MigrationError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            MigrationError::Store(_) => "migration_store",
            MigrationError::PermissionDenied { .. } => "migration_permission_denied",
            MigrationError::Backup { .. } => "migration_backup_failed",
            MigrationError::Io { .. } => "migration_io",
            MigrationError::Overlay(_) => "migration_overlay",
            MigrationError::Cancelled { .. } => "migration_cancelled",
        }
    }
}

/// # Errors produced by one scheduler tick.
///
/// The scheduler logs these and continues on the next tick.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Settings could not be loaded or were invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The activation record could not be read.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The triggered migration aborted.
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

impl SchedulerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SchedulerError::Config(e) => e.as_label(),
            SchedulerError::Store(e) => e.as_label(),
            SchedulerError::Migration(e) => e.as_label(),
        }
    }
}

/// # Errors that stop the daemon before or outside the scheduler loop.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Settings could not be loaded or were invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The version record or catalog could not be read.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The startup overlay could not be applied.
    #[error(transparent)]
    Overlay(#[from] OverlayError),

    /// A requested migration aborted.
    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// OS signal handlers could not be installed.
    #[error("failed to install signal handlers: {0}")]
    Signal(#[source] io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Config(e) => e.as_label(),
            RuntimeError::Store(e) => e.as_label(),
            RuntimeError::Overlay(e) => e.as_label(),
            RuntimeError::Migration(e) => e.as_label(),
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_label_delegates_to_inner() {
        let err = SchedulerError::from(ConfigError::InvalidHour(24));
        assert_eq!(err.as_label(), "config_invalid_hour");

        let err = SchedulerError::from(MigrationError::Cancelled { step: "commit" });
        assert_eq!(err.as_label(), "migration_cancelled");
    }

    #[test]
    fn test_permission_denied_message_is_operator_facing() {
        let err = MigrationError::PermissionDenied {
            path: PathBuf::from("current"),
        };
        assert!(err.to_string().contains("open in another program"));
    }
}
