//! # Configuration overlay.
//!
//! Translates the nested overlay document (`properties.json`) into `key=value`
//! lines of the server's flat properties file.
//!
//! ```text
//! {"a": {"b": 1}, "c": [{"d": true}]}  ──flatten──►  a.b=1
//!                                                     c.[0].d=true
//! ```
//!
//! ## Rules
//! - Each key rewrites the **first** line of the target containing it as a whole word.
//! - Keys with no matching line are dropped (reported, never appended).
//! - Before 1.14.0, `difficulty` and `gamemode` take numeric ids; known names are
//!   remapped, unknown values pass through unchanged.
//! - A missing overlay source is an empty overlay; a missing target matches nothing.

use std::io;
use std::path::{Path, PathBuf};

use regex_lite::Regex;
use serde_json::Value;

use crate::config::Layout;
use crate::error::OverlayError;
use crate::version::Version;

/// First version whose properties file accepts symbolic `difficulty` / `gamemode`.
const SYMBOLIC_SINCE: Version = Version::new(1, 14, 0);

/// Result of one overlay application.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OverlayReport {
    /// Every flattened `(key, value)` after remapping, in document order.
    pub values: Vec<(String, String)>,
    /// Keys whose line was rewritten.
    pub applied: Vec<String>,
    /// Keys with no matching line in the target.
    pub dropped: Vec<String>,
}

impl OverlayReport {
    /// Rendered value of `key`, if the overlay defines it.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Applies the overlay document at `source` to the properties file at `target`.
#[derive(Clone, Debug)]
pub struct OverlayApplier {
    source: PathBuf,
    target: PathBuf,
}

impl OverlayApplier {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// `properties.json` onto `current/server.properties`.
    pub fn from_layout(layout: &Layout) -> Self {
        Self::new(layout.overlay_file(), layout.properties_file())
    }

    /// Reads and flattens the overlay for `version` without touching the target.
    pub fn values(&self, version: Version) -> Result<Vec<(String, String)>, OverlayError> {
        let doc = match std::fs::read_to_string(&self.source) {
            Ok(text) => serde_json::from_str::<Value>(&text).map_err(|source| {
                OverlayError::Parse {
                    path: self.source.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.source.display(), "no overlay source");
                return Ok(Vec::new());
            }
            Err(source) => return Err(io_err(&self.source, source)),
        };

        let mut out = Vec::new();
        flatten(&doc, "", &mut out);
        Ok(out
            .into_iter()
            .map(|(key, leaf)| {
                let value = remap(&key, leaf, version).unwrap_or_else(|| render(leaf));
                (key, value)
            })
            .collect())
    }

    /// Rewrites the target with the overlay for `version`.
    pub fn apply(&self, version: Version) -> Result<OverlayReport, OverlayError> {
        let values = self.values(version)?;

        let original = match std::fs::read_to_string(&self.target) {
            Ok(text) => Some(text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(source) => return Err(io_err(&self.target, source)),
        };

        let mut text = original.clone().unwrap_or_default();
        let mut applied = Vec::new();
        let mut dropped = Vec::new();
        for (key, value) in &values {
            match rewrite_first_line(&text, key, value) {
                Some(next) => {
                    text = next;
                    applied.push(key.clone());
                }
                None => {
                    tracing::debug!(key = %key, "overlay key has no line in target; dropped");
                    dropped.push(key.clone());
                }
            }
        }

        if original.is_some_and(|orig| orig != text) {
            std::fs::write(&self.target, &text).map_err(|source| io_err(&self.target, source))?;
        }

        Ok(OverlayReport {
            values,
            applied,
            dropped,
        })
    }
}

/// Collects scalar leaves of `node` under dotted / indexed keys.
fn flatten<'a>(node: &'a Value, prefix: &str, out: &mut Vec<(String, &'a Value)>) {
    match node {
        Value::Object(map) => {
            for (k, v) in map {
                flatten(v, &join(prefix, k), out);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten(v, &join(prefix, &format!("[{i}]")), out);
            }
        }
        // a bare scalar document has no key to write
        leaf if !prefix.is_empty() => out.push((prefix.to_string(), leaf)),
        _ => {}
    }
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

/// Numeric id for a symbolic value the target version does not understand yet.
fn remap(key: &str, value: &Value, version: Version) -> Option<String> {
    if version >= SYMBOLIC_SINCE {
        return None;
    }
    let id = match (key, value.as_str()?) {
        ("difficulty", "peaceful") => 0,
        ("difficulty", "easy") => 1,
        ("difficulty", "normal") => 2,
        ("difficulty", "hard") => 3,
        ("gamemode", "survival") => 0,
        ("gamemode", "creative") => 1,
        ("gamemode", "adventure") => 2,
        _ => return None,
    };
    Some(id.to_string())
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Replaces the first line containing `key` as a whole word with `key=value`.
///
/// Returns `None` when no line matches. Line endings are preserved.
pub fn rewrite_first_line(text: &str, key: &str, value: &str) -> Option<String> {
    let re = Regex::new(&format!(r"\b{}\b", regex_lite::escape(key))).ok()?;

    let mut out = String::with_capacity(text.len() + value.len());
    let mut replaced = false;
    for line in text.split_inclusive('\n') {
        if !replaced && re.is_match(line) {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            if line.ends_with('\n') {
                out.push('\n');
            }
            replaced = true;
        } else {
            out.push_str(line);
        }
    }
    replaced.then_some(out)
}

fn io_err(path: &Path, source: io::Error) -> OverlayError {
    OverlayError::Io {
        path: path.to_path_buf(),
        source,
    }
}
