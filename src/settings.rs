//! # Operator settings (`settings.json`).
//!
//! ```json
//! {
//!   "java-Xmx": "4G", "java-Xms": "1G",
//!   "viaproxy-enable": true,
//!   "viaproxy-java-Xmx": "512M", "viaproxy-java-Xms": "256M", "viaproxy-port": 25568,
//!   "update_frequency_days": 7, "update_weekday": "saturday", "update_time_utc": 4,
//!   "discord_webhook_url": ""
//! }
//! ```
//!
//! Missing keys take the defaults of [`Settings::default`]. The scheduler re-reads
//! the file on every tick, so schedule edits apply without a restart.

use std::io;
use std::path::Path;

use chrono::{TimeDelta, Weekday};
use serde::Deserialize;

use crate::error::ConfigError;

/// Operator settings.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Server heap maximum (`-Xmx`).
    #[serde(rename = "java-Xmx")]
    pub java_xmx: String,
    /// Server initial heap (`-Xms`).
    #[serde(rename = "java-Xms")]
    pub java_xms: String,
    /// Whether the protocol proxy is supervised at all.
    #[serde(rename = "viaproxy-enable")]
    pub proxy_enabled: bool,
    #[serde(rename = "viaproxy-java-Xmx")]
    pub proxy_java_xmx: String,
    #[serde(rename = "viaproxy-java-Xms")]
    pub proxy_java_xms: String,
    /// Public port the proxy binds.
    #[serde(rename = "viaproxy-port")]
    pub proxy_port: u16,
    /// Minimum age of the active version before the next upgrade.
    pub update_frequency_days: f64,
    /// Weekday name (`monday` .. `sunday`), evaluated in UTC.
    pub update_weekday: String,
    /// UTC hour (`0..=23`) of the upgrade window.
    pub update_time_utc: u32,
    /// Webhook for upgrade notifications; empty disables them.
    pub discord_webhook_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            java_xmx: "2G".into(),
            java_xms: "1G".into(),
            proxy_enabled: false,
            proxy_java_xmx: "512M".into(),
            proxy_java_xms: "256M".into(),
            proxy_port: 25568,
            update_frequency_days: 7.0,
            update_weekday: "monday".into(),
            update_time_utc: 4,
            discord_webhook_url: String::new(),
        }
    }
}

impl Settings {
    /// Reads and parses the settings file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file; using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Parsed `update_weekday`.
    pub fn weekday(&self) -> Result<Weekday, ConfigError> {
        match self.update_weekday.trim().to_ascii_lowercase().as_str() {
            "monday" => Ok(Weekday::Mon),
            "tuesday" => Ok(Weekday::Tue),
            "wednesday" => Ok(Weekday::Wed),
            "thursday" => Ok(Weekday::Thu),
            "friday" => Ok(Weekday::Fri),
            "saturday" => Ok(Weekday::Sat),
            "sunday" => Ok(Weekday::Sun),
            _ => Err(ConfigError::InvalidWeekday(self.update_weekday.clone())),
        }
    }

    /// Validated `update_time_utc`.
    pub fn update_hour(&self) -> Result<u32, ConfigError> {
        if self.update_time_utc > 23 {
            return Err(ConfigError::InvalidHour(self.update_time_utc));
        }
        Ok(self.update_time_utc)
    }

    /// `update_frequency_days` as a duration; negative or non-finite values become zero.
    pub fn update_frequency(&self) -> TimeDelta {
        let days = self.update_frequency_days;
        if !days.is_finite() || days <= 0.0 {
            return TimeDelta::zero();
        }
        TimeDelta::try_milliseconds((days * 86_400_000.0) as i64).unwrap_or(TimeDelta::MAX)
    }

    /// Webhook URL, or `None` when notifications are disabled.
    pub fn webhook_url(&self) -> Option<&str> {
        let url = self.discord_webhook_url.trim();
        (!url.is_empty()).then_some(url)
    }
}
