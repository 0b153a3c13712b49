//! Backing sources for the raw settings: a properties file on disk, or an
//! in-memory table for embedding hosts and tests.

use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::settings::RawSettings;
use crate::error::ConfigError;

pub trait ConfigSource: Send + Sync {
    /// Human-readable name used in logs and errors.
    fn describe(&self) -> String;
    fn modified(&self) -> Result<SystemTime, ConfigError>;
    fn read(&self) -> Result<RawSettings, ConfigError>;
}

pub struct PropertiesFileSource {
    path: PathBuf,
}

impl PropertiesFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self { Self { path: path.as_ref().to_path_buf() } }

    fn unreadable(&self, e: std::io::Error) -> ConfigError {
        ConfigError::Unreadable { source_name: self.describe(), message: e.to_string() }
    }
}

impl ConfigSource for PropertiesFileSource {
    fn describe(&self) -> String { self.path.display().to_string() }

    fn modified(&self) -> Result<SystemTime, ConfigError> {
        std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .map_err(|e| self.unreadable(e))
    }

    fn read(&self) -> Result<RawSettings, ConfigError> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| self.unreadable(e))?;
        Ok(parse_properties(&text))
    }
}

/// Parse `key=value`, `key: value` or `key value` lines. `#` and `!` start a
/// comment line; a trailing backslash continues the value on the next line.
pub fn parse_properties(text: &str) -> RawSettings {
    let mut out = RawSettings::new();
    let mut pending = String::new();
    for line in text.lines() {
        let trimmed = line.trim_start();
        if pending.is_empty() && (trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!')) {
            continue;
        }
        let trailing = trimmed.len() - trimmed.trim_end_matches('\\').len();
        if trailing % 2 == 1 {
            pending.push_str(&trimmed[..trimmed.len() - 1]);
            continue;
        }
        pending.push_str(trimmed);
        let logical = std::mem::take(&mut pending);
        if let Some((k, v)) = split_property(&logical) {
            out.push(k, v);
        }
    }
    if !pending.is_empty() {
        if let Some((k, v)) = split_property(&pending) { out.push(k, v); }
    }
    out
}

/// Split one logical line at the first unescaped `=`, `:` or whitespace.
/// A backslash escapes the next key character, so URN-style attribute values
/// can be written as `header.dynamicroles.urn\:mace\:staff=grp`.
fn split_property(line: &str) -> Option<(String, String)> {
    let mut key = String::new();
    let mut value_start = line.len();
    let mut chars = line.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                if let Some((_, escaped)) = chars.next() { key.push(escaped); }
            }
            '=' | ':' => {
                value_start = i + 1;
                break;
            }
            c if c.is_whitespace() => {
                let rest = line[i..].trim_start();
                let rest = rest.strip_prefix(|c: char| c == '=' || c == ':').unwrap_or(rest);
                value_start = line.len() - rest.len();
                break;
            }
            c => key.push(c),
        }
    }
    let key = key.trim();
    if key.is_empty() { return None; }
    Some((key.to_string(), line[value_start..].trim().to_string()))
}

/// In-memory source. Every `replace` advances the reported modification time.
pub struct StaticSource {
    inner: RwLock<(RawSettings, u64)>,
}

impl StaticSource {
    pub fn new(raw: RawSettings) -> Self { Self { inner: RwLock::new((raw, 1)) } }

    pub fn replace(&self, raw: RawSettings) {
        let mut g = self.inner.write();
        g.0 = raw;
        g.1 += 1;
    }
}

impl ConfigSource for StaticSource {
    fn describe(&self) -> String { "<static>".to_string() }

    fn modified(&self) -> Result<SystemTime, ConfigError> {
        Ok(UNIX_EPOCH + Duration::from_secs(self.inner.read().1))
    }

    fn read(&self) -> Result<RawSettings, ConfigError> { Ok(self.inner.read().0.clone()) }
}
