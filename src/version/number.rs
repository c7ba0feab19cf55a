//! # Version numbers.
//!
//! A [`Version`] is `(major, minor, patch)` ordered lexicographically on the full
//! tuple, so `2.0.0 > 1.17.0`. Strings parse as `MAJOR.MINOR[.PATCH]` with the
//! patch defaulting to 0 and always format as `MAJOR.MINOR.PATCH`.
//!
//! ```rust
//! use serverkeeper::Version;
//!
//! let v: Version = "1.16".parse().unwrap();
//! assert_eq!(v.to_string(), "1.16.0");
//! assert_eq!(v.proxy_target(), "1.16");
//! assert!(Version::SENTINEL < v);
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex_lite::Regex;

use crate::error::StoreError;

static VERSION_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.(\d+)(?:\.(\d+))?$").ok());

/// An ordered, immutable version triple.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    /// The "not yet initialized" placeholder, `0.0.0`.
    pub const SENTINEL: Version = Version::new(0, 0, 0);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses `MAJOR.MINOR[.PATCH]`; returns `None` for anything else.
    pub fn parse(s: &str) -> Option<Self> {
        let caps = VERSION_RE.as_ref()?.captures(s)?;
        let major = caps.get(1)?.as_str().parse().ok()?;
        let minor = caps.get(2)?.as_str().parse().ok()?;
        let patch = match caps.get(3) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };
        Some(Self::new(major, minor, patch))
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }

    /// Version string handed to the protocol proxy: a `.0` patch is dropped.
    pub fn proxy_target(&self) -> String {
        if self.patch == 0 {
            format!("{}.{}", self.major, self.minor)
        } else {
            self.to_string()
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| StoreError::InvalidVersion(s.to_string()))
    }
}
