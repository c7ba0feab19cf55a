//! # Runtime configuration and on-disk layout.
//!
//! [`Config`] centralizes the timing knobs of the runtime (stop timeout, restart
//! policy, generation timeout, scheduler period). [`Layout`] names every path the
//! daemon touches under one base directory:
//!
//! ```text
//! <base>/
//!   current/            active data root (server.jar, eula.txt, server.properties, world/)
//!   old/                backup root (previous active root after a migration)
//!   servers/<X.Y[.Z]>/  version catalog; each entry holds server.jar
//!   viaproxy/           proxy working directory (ViaProxy.jar)
//!   current.txt         durable active-version record
//!   settings.json       operator settings
//!   properties.json     configuration overlay source
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::policies::{BackoffPolicy, RestartPolicy};

/// Default capacity of the event bus.
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Global runtime configuration.
///
/// ## Field semantics
/// - `stop_timeout`: graceful-exit wait per process, and the worker join budget
/// - `restart` / `backoff`: relaunch decisions for both supervised processes
/// - `generation_timeout`: bound on the one-shot config generation run (timeout = success)
/// - `check_period`: scheduler tick period (minus the time the tick took)
/// - `bus_capacity`: event ring buffer size (min 1)
#[derive(Clone, Debug)]
pub struct Config {
    /// How long `stop()` waits for voluntary exit before killing.
    pub stop_timeout: Duration,
    /// Relaunch policy for supervised processes.
    pub restart: RestartPolicy,
    /// Relaunch delay policy (default: constant 5s).
    pub backoff: BackoffPolicy,
    /// Bound on the one-shot generation run of a freshly placed binary.
    pub generation_timeout: Duration,
    /// Period of the update scheduler.
    pub check_period: Duration,
    /// Capacity of the event bus.
    pub bus_capacity: usize,
}

impl Default for Config {
    /// - `stop_timeout = 10s`
    /// - `restart = Always`, `backoff = constant 5s`
    /// - `generation_timeout = 10s`
    /// - `check_period = 60s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            stop_timeout: Duration::from_secs(10),
            restart: RestartPolicy::default(),
            backoff: BackoffPolicy::default(),
            generation_timeout: Duration::from_secs(10),
            check_period: Duration::from_secs(60),
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }
}

impl Config {
    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

/// Paths used by the daemon, all derived from one base directory.
#[derive(Clone, Debug)]
pub struct Layout {
    base: PathBuf,
}

impl Layout {
    pub const SERVER_JAR: &'static str = "server.jar";
    pub const PROXY_JAR: &'static str = "ViaProxy.jar";
    pub const EULA: &'static str = "eula.txt";
    pub const PROPERTIES: &'static str = "server.properties";
    pub const WORLD: &'static str = "world";

    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Active data root.
    pub fn current_dir(&self) -> PathBuf {
        self.base.join("current")
    }

    /// Backup root.
    pub fn backup_dir(&self) -> PathBuf {
        self.base.join("old")
    }

    /// Previous backup root, parked here while the active root is renamed.
    pub fn backup_staging_dir(&self) -> PathBuf {
        self.base.join("old.prev")
    }

    /// Version catalog.
    pub fn catalog_dir(&self) -> PathBuf {
        self.base.join("servers")
    }

    pub fn proxy_dir(&self) -> PathBuf {
        self.base.join("viaproxy")
    }

    /// Durable active-version record.
    pub fn record_file(&self) -> PathBuf {
        self.base.join("current.txt")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.base.join("settings.json")
    }

    /// Overlay source.
    pub fn overlay_file(&self) -> PathBuf {
        self.base.join("properties.json")
    }

    /// Overlay target inside the active data root.
    pub fn properties_file(&self) -> PathBuf {
        self.current_dir().join(Self::PROPERTIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths_share_base() {
        let layout = Layout::new("/srv/mc");
        assert_eq!(layout.current_dir(), PathBuf::from("/srv/mc/current"));
        assert_eq!(layout.backup_dir(), PathBuf::from("/srv/mc/old"));
        assert_eq!(layout.backup_staging_dir(), PathBuf::from("/srv/mc/old.prev"));
        assert_eq!(
            layout.properties_file(),
            PathBuf::from("/srv/mc/current/server.properties")
        );
    }

    #[test]
    fn test_bus_capacity_clamped() {
        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
