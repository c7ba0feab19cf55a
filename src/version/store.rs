//! # Durable version state.
//!
//! [`VersionStore`] is the single source of truth for *which version is active*
//! (the two-line record) and *which versions exist* (the catalog directory).
//!
//! ## Record format
//! ```text
//! 1.16.0
//! 2024-05-04T04:00:12.345678+00:00
//! ```
//! A missing record is created as `0.0.0` / `2000-01-01 00:00:00.000000+00:00`.
//! Anything else that does not parse is [`StoreError::CorruptState`] and is never
//! silently defaulted.
//!
//! ## Catalog
//! Every sub-directory of the catalog whose name parses as a [`Version`] is a
//! candidate. The sentinel is always present. The list is rebuilt on every call.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

use crate::error::StoreError;
use crate::version::Version;

/// Record contents written when no record exists yet.
const DEFAULT_RECORD: &str = "0.0.0\n2000-01-01 00:00:00.000000+00:00";

/// The active version and when it was activated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActiveVersionRecord {
    pub version: Version,
    pub activated_at: DateTime<Utc>,
}

impl ActiveVersionRecord {
    pub fn new(version: Version, activated_at: DateTime<Utc>) -> Self {
        Self {
            version,
            activated_at,
        }
    }

    /// Renders the two-line on-disk form.
    pub fn render(&self) -> String {
        format!(
            "{}\n{}",
            self.version,
            self.activated_at.to_rfc3339_opts(SecondsFormat::Micros, false)
        )
    }

    /// Parses the two-line on-disk form; `path` is only used for error reporting.
    pub fn parse(text: &str, path: &Path) -> Result<Self, StoreError> {
        let corrupt = |reason: String| StoreError::CorruptState {
            path: path.to_path_buf(),
            reason,
        };

        let lines: Vec<&str> = text.lines().collect();
        let [version, timestamp] = lines.as_slice() else {
            return Err(corrupt(format!("expected 2 lines, found {}", lines.len())));
        };

        let version = Version::parse(version.trim())
            .ok_or_else(|| corrupt(format!("unparseable version {version:?}")))?;
        let activated_at = parse_timestamp(timestamp.trim())
            .ok_or_else(|| corrupt(format!("unparseable timestamp {timestamp:?}")))?;

        Ok(Self::new(version, activated_at))
    }
}

/// Accepts RFC 3339 with either `T` or a space between date and time.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z"))
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt.naive_utc()))
}

/// Reads and writes the active version record and enumerates the catalog.
#[derive(Clone, Debug)]
pub struct VersionStore {
    record: PathBuf,
    catalog: PathBuf,
}

impl VersionStore {
    /// Creates a store over `record` (file) and `catalog` (directory).
    pub fn new(record: impl Into<PathBuf>, catalog: impl Into<PathBuf>) -> Self {
        Self {
            record: record.into(),
            catalog: catalog.into(),
        }
    }

    pub fn record_path(&self) -> &Path {
        &self.record
    }

    pub fn catalog_dir(&self) -> &Path {
        &self.catalog
    }

    /// Reads the active record, creating it with sentinel defaults on first use.
    pub fn current(&self) -> Result<ActiveVersionRecord, StoreError> {
        let text = match std::fs::read_to_string(&self.record) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.write_atomic(DEFAULT_RECORD)?;
                tracing::info!(path = %self.record.display(), "created version record");
                DEFAULT_RECORD.to_string()
            }
            Err(source) => return Err(self.io_err(&self.record, source)),
        };
        ActiveVersionRecord::parse(&text, &self.record)
    }

    /// Convenience: the active version only.
    pub fn current_version(&self) -> Result<Version, StoreError> {
        Ok(self.current()?.version)
    }

    /// Lists cataloged versions plus the sentinel, sorted ascending, deduplicated.
    ///
    /// A missing catalog directory yields just the sentinel.
    pub fn available(&self) -> Result<Vec<Version>, StoreError> {
        let mut versions = vec![Version::SENTINEL];

        let entries = match std::fs::read_dir(&self.catalog) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(versions),
            Err(source) => return Err(self.io_err(&self.catalog, source)),
        };

        for entry in entries {
            let entry = entry.map_err(|source| self.io_err(&self.catalog, source))?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(v) = entry.file_name().to_str().and_then(Version::parse) {
                versions.push(v);
            }
        }

        versions.sort_unstable();
        versions.dedup();
        Ok(versions)
    }

    /// The version to migrate to from `current`, if any.
    pub fn next(&self, current: Version) -> Result<Option<Version>, StoreError> {
        Ok(successor(&self.available()?, current))
    }

    /// Atomically replaces the record (temporary file + rename).
    pub fn commit(&self, record: &ActiveVersionRecord) -> Result<(), StoreError> {
        self.write_atomic(&record.render())
    }

    fn write_atomic(&self, contents: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.record.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| self.io_err(parent, source))?;
        }
        let tmp = self.record.with_extension("tmp");
        std::fs::write(&tmp, contents).map_err(|source| self.io_err(&tmp, source))?;
        std::fs::rename(&tmp, &self.record).map_err(|source| self.io_err(&self.record, source))
    }

    fn io_err(&self, path: &Path, source: io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Successor of `current` in the sorted `versions`.
///
/// An unknown `current` restarts from the first non-sentinel version.
pub fn successor(versions: &[Version], current: Version) -> Option<Version> {
    match versions.iter().position(|v| *v == current) {
        Some(i) => versions.get(i + 1).copied(),
        None => versions.iter().find(|v| !v.is_sentinel()).copied(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> VersionStore {
        VersionStore::new(dir.path().join("current.txt"), dir.path().join("servers"))
    }

    fn catalog(dir: &TempDir, names: &[&str]) {
        for name in names {
            std::fs::create_dir_all(dir.path().join("servers").join(name)).unwrap();
        }
    }

    #[test]
    fn test_missing_record_created_with_sentinel() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let rec = store.current().unwrap();
        assert_eq!(rec.version, Version::SENTINEL);
        assert_eq!(rec.activated_at, Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap());
        assert!(store.record_path().exists());
    }

    #[test]
    fn test_commit_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let at = Utc.with_ymd_and_hms(2024, 5, 4, 4, 0, 12).unwrap();

        store
            .commit(&ActiveVersionRecord::new(Version::new(1, 16, 0), at))
            .unwrap();

        let rec = store.current().unwrap();
        assert_eq!(rec.version, Version::new(1, 16, 0));
        assert_eq!(rec.activated_at, at);
        assert!(!dir.path().join("current.tmp").exists());
    }

    #[test]
    fn test_corrupt_record_is_not_defaulted() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        for bad in ["1.16.0", "garbage\n2024-01-01 00:00:00+00:00", "1.16.0\nyesterday", ""] {
            std::fs::write(store.record_path(), bad).unwrap();
            assert!(
                matches!(store.current(), Err(StoreError::CorruptState { .. })),
                "{bad:?} should be corrupt"
            );
        }
    }

    #[test]
    fn test_accepts_space_separated_timestamp() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.record_path(), "1.12\n2024-03-01 10:30:00.5+00:00\n").unwrap();

        let rec = store.current().unwrap();
        assert_eq!(rec.version, Version::new(1, 12, 0));
        assert_eq!(rec.activated_at.timestamp(), 1_709_289_000);
    }

    #[test]
    fn test_available_filters_and_orders_by_full_tuple() {
        let dir = TempDir::new().unwrap();
        catalog(&dir, &["1.17", "2.0.0", "1.16.5", "snapshots", "1.16.5"]);
        std::fs::write(dir.path().join("servers").join("1.18"), "not a dir").unwrap();

        let versions = store_in(&dir).available().unwrap();
        assert_eq!(
            versions,
            vec![
                Version::SENTINEL,
                Version::new(1, 16, 5),
                Version::new(1, 17, 0),
                Version::new(2, 0, 0),
            ]
        );
    }

    #[test]
    fn test_missing_catalog_is_sentinel_only() {
        let dir = TempDir::new().unwrap();
        assert_eq!(store_in(&dir).available().unwrap(), vec![Version::SENTINEL]);
    }

    #[test]
    fn test_next_visits_every_version_once() {
        let dir = TempDir::new().unwrap();
        catalog(&dir, &["1.12.2", "1.16", "1.17", "1.8"]);
        let store = store_in(&dir);

        let mut visited = Vec::new();
        let mut current = Version::SENTINEL;
        while let Some(next) = store.next(current).unwrap() {
            visited.push(next);
            current = next;
        }

        assert_eq!(
            visited,
            vec![
                Version::new(1, 8, 0),
                Version::new(1, 12, 2),
                Version::new(1, 16, 0),
                Version::new(1, 17, 0),
            ]
        );
    }

    #[test]
    fn test_unknown_current_starts_from_beginning() {
        let versions = [Version::SENTINEL, Version::new(1, 16, 0), Version::new(1, 17, 0)];
        assert_eq!(
            successor(&versions, Version::new(1, 15, 2)),
            Some(Version::new(1, 16, 0))
        );
        assert_eq!(successor(&versions, Version::new(1, 17, 0)), None);
        assert_eq!(successor(&[Version::SENTINEL], Version::SENTINEL), None);
    }
}
