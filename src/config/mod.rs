//! Runtime configuration: raw key/value settings, the parsed mapping rules
//! and the loader that hot-reloads them.

mod loader;
mod rules;
mod settings;
mod source;

pub use loader::ConfigLoader;
pub use rules::{MappingRuleSet, PurgeSpec};
pub use settings::{split_list, AuthSettings, RawSettings, ReloadSettings};
pub use source::{parse_properties, ConfigSource, PropertiesFileSource, StaticSource};

pub mod keys {
    pub use super::settings::{
        CREATE_GROUPS, CREATE_USERS, DEFAULT_ROLES, EMAIL_HEADER, FULLNAME_HEADER, PURGE_ROLES_PREFIX, RELOAD_CONFIG,
        RELOAD_CONFIG_CHECK_INTERVAL, ROLES_ATTRIB_NAMES, ROLES_ATTRIB_PREFIX, UPDATE_INFO, UPDATE_LAST_LOGIN,
        UPDATE_ROLES,
    };
}

use serde::Serialize;

use crate::error::ConfigError;

/// Everything one request needs from configuration, parsed from a single read
/// of the source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActiveConfig {
    pub settings: AuthSettings,
    pub rules: MappingRuleSet,
}

impl ActiveConfig {
    pub fn parse(raw: &RawSettings) -> Result<Self, ConfigError> {
        Ok(Self { settings: AuthSettings::parse(raw)?, rules: MappingRuleSet::parse(raw)? })
    }
}
