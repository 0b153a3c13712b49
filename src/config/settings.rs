use serde::Serialize;
use std::time::Duration;

use crate::error::ConfigError;

pub const CREATE_USERS: &str = "create.users";
pub const UPDATE_INFO: &str = "update.info";
pub const UPDATE_ROLES: &str = "update.roles";
pub const CREATE_GROUPS: &str = "create.groups";
pub const UPDATE_LAST_LOGIN: &str = "update.last.login";
pub const DEFAULT_ROLES: &str = "default.roles";
pub const FULLNAME_HEADER: &str = "header.fullname";
pub const EMAIL_HEADER: &str = "header.email";
pub const ROLES_ATTRIB_NAMES: &str = "header.dynamicroles.attributenames";
/// Prefix of attribute-value mapping keys, e.g. `header.dynamicroles.staff=grp1,grp2`.
pub const ROLES_ATTRIB_PREFIX: &str = "header.dynamicroles.";
/// Prefix of purge keys, e.g. `purge.roles.shib-ep-entitlement=grp1,grp2`.
pub const PURGE_ROLES_PREFIX: &str = "purge.roles.";
pub const RELOAD_CONFIG: &str = "reload.config";
pub const RELOAD_CONFIG_CHECK_INTERVAL: &str = "reload.config.check.interval";

pub const DEFAULT_RELOAD_CHECK_INTERVAL_MS: u64 = 5_000;

/// Split a list setting or header value. Separators are `,`, `;` and any
/// whitespace; tokens come back trimmed and never empty. Every list in the
/// crate goes through here.
pub fn split_list(s: &str) -> impl Iterator<Item = &str> {
    s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Raw key/value settings in source order. Duplicate keys are kept; lookups
/// return the last occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawSettings {
    entries: Vec<(String, String)>,
}

impl RawSettings {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Last value stored under `key`. Keys are case-sensitive; only
    /// surrounding whitespace is ignored.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k.trim() == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawSettings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadSettings {
    pub enabled: bool,
    pub check_interval: Duration,
}

impl Default for ReloadSettings {
    fn default() -> Self {
        Self { enabled: false, check_interval: Duration::from_millis(DEFAULT_RELOAD_CHECK_INTERVAL_MS) }
    }
}

/// Scalar behaviour switches and header names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthSettings {
    pub create_users: bool,
    pub update_info: bool,
    pub update_roles: bool,
    /// Create a group that the directory does not know instead of skipping it.
    pub create_groups: bool,
    pub update_last_login: bool,
    pub full_name_header: Option<String>,
    pub email_header: Option<String>,
    pub reload: ReloadSettings,
}

impl AuthSettings {
    pub fn parse(raw: &RawSettings) -> Result<Self, ConfigError> {
        let check_interval = match non_blank(raw, RELOAD_CONFIG_CHECK_INTERVAL) {
            None => Duration::from_millis(DEFAULT_RELOAD_CHECK_INTERVAL_MS),
            Some(v) => v.parse::<u64>().map(Duration::from_millis).map_err(|_| ConfigError::InvalidValue {
                key: RELOAD_CONFIG_CHECK_INTERVAL.to_string(),
                value: v.to_string(),
            })?,
        };
        Ok(Self {
            create_users: parse_bool(raw, CREATE_USERS)?,
            update_info: parse_bool(raw, UPDATE_INFO)?,
            update_roles: parse_bool(raw, UPDATE_ROLES)?,
            create_groups: parse_bool(raw, CREATE_GROUPS)?,
            update_last_login: parse_bool(raw, UPDATE_LAST_LOGIN)?,
            full_name_header: non_blank(raw, FULLNAME_HEADER).map(str::to_string),
            email_header: non_blank(raw, EMAIL_HEADER).map(str::to_string),
            reload: ReloadSettings { enabled: parse_bool(raw, RELOAD_CONFIG)?, check_interval },
        })
    }
}

fn non_blank<'a>(raw: &'a RawSettings, key: &str) -> Option<&'a str> {
    raw.get(key).map(str::trim).filter(|v| !v.is_empty())
}

/// Absent or empty means false.
fn parse_bool(raw: &RawSettings, key: &str) -> Result<bool, ConfigError> {
    let Some(v) = non_blank(raw, key) else { return Ok(false); };
    match v.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue { key: key.to_string(), value: v.to_string() }),
    }
}
