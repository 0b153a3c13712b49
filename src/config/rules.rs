use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

use super::settings::{
    split_list, RawSettings, DEFAULT_ROLES, PURGE_ROLES_PREFIX, ROLES_ATTRIB_NAMES, ROLES_ATTRIB_PREFIX,
};
use crate::error::ConfigError;

/// Groups that may be revoked, but only on a request that carried
/// `attribute`: that header is then authoritative for them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PurgeSpec {
    /// Lower-cased attribute header name.
    pub attribute: String,
    pub groups: Vec<String>,
}

/// Parsed mapping rules. Built once per load and never mutated afterwards;
/// a reload produces a new value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MappingRuleSet {
    default_roles: Vec<String>,
    watched_attributes: BTreeSet<String>,
    attribute_value_to_groups: HashMap<String, Vec<String>>,
    purge_rules: Vec<PurgeSpec>,
}

impl MappingRuleSet {
    pub fn parse(raw: &RawSettings) -> Result<Self, ConfigError> {
        let mut default_roles: Vec<String> = Vec::new();
        if let Some(v) = raw.get(DEFAULT_ROLES) {
            for role in split_list(v) {
                if !default_roles.iter().any(|r| r == role) {
                    debug!(role = %role, "default role");
                    default_roles.push(role.to_string());
                }
            }
        }

        let watched_attributes: BTreeSet<String> = raw
            .get(ROLES_ATTRIB_NAMES)
            .map(|v| split_list(v).map(str::to_lowercase).collect())
            .unwrap_or_default();
        for attrib in &watched_attributes {
            debug!(attribute = %attrib, "watching dynamic role attribute");
        }

        let mut attribute_value_to_groups: HashMap<String, Vec<String>> = HashMap::new();
        for (key, value) in raw.iter() {
            let lowered = key.trim().to_lowercase();
            if !lowered.starts_with(ROLES_ATTRIB_PREFIX) || lowered.starts_with(ROLES_ATTRIB_NAMES) {
                continue;
            }
            let attrib_value = lowered[ROLES_ATTRIB_PREFIX.len()..].trim().to_string();
            if attrib_value.is_empty() {
                return Err(ConfigError::MalformedRule { key: key.to_string(), reason: "no attribute value after prefix".into() });
            }
            let groups: Vec<String> = split_list(value).map(str::to_string).collect();
            if groups.is_empty() {
                return Err(ConfigError::MalformedRule { key: key.to_string(), reason: "maps to no groups".into() });
            }
            debug!(rule = %key, value = %attrib_value, groups = ?groups, "role mapping");
            // last declaration wins
            attribute_value_to_groups.insert(attrib_value, groups);
        }

        let mut purge_table: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, value) in raw.iter() {
            let lowered = key.trim().to_lowercase();
            let Some(attribute) = lowered.strip_prefix(PURGE_ROLES_PREFIX) else { continue; };
            let attribute = attribute.trim();
            if attribute.is_empty() {
                return Err(ConfigError::MalformedRule { key: key.to_string(), reason: "no attribute name after prefix".into() });
            }
            let mut groups: Vec<String> = Vec::new();
            for g in split_list(value) {
                if !groups.iter().any(|x| x == g) { groups.push(g.to_string()); }
            }
            if groups.is_empty() {
                return Err(ConfigError::MalformedRule { key: key.to_string(), reason: "purges no groups".into() });
            }
            if !watched_attributes.contains(attribute) {
                warn!(rule = %key, attribute = %attribute, "purge rule names an attribute that is not watched, it never applies");
            }
            debug!(rule = %key, attribute = %attribute, groups = ?groups, "purge rule");
            purge_table.insert(attribute.to_string(), groups);
        }
        let purge_rules: Vec<PurgeSpec> =
            purge_table.into_iter().map(|(attribute, groups)| PurgeSpec { attribute, groups }).collect();

        Ok(Self { default_roles, watched_attributes, attribute_value_to_groups, purge_rules })
    }

    pub fn default_roles(&self) -> &[String] { &self.default_roles }

    pub fn watched_attributes(&self) -> &BTreeSet<String> { &self.watched_attributes }

    /// True when the header name, trimmed and lower-cased, is on the watch list.
    pub fn is_watched(&self, header: &str) -> bool {
        self.watched_attributes.contains(&header.trim().to_lowercase())
    }

    /// Groups mapped from one attribute value. The lookup key is normalized here.
    pub fn groups_for(&self, attribute_value: &str) -> Option<&[String]> {
        self.attribute_value_to_groups
            .get(&attribute_value.trim().to_lowercase())
            .map(Vec::as_slice)
    }

    pub fn mapping_count(&self) -> usize { self.attribute_value_to_groups.len() }

    pub fn purge_rules(&self) -> &[PurgeSpec] { &self.purge_rules }

    /// Every group name the rules can produce, for seeding a directory.
    pub fn all_groups(&self) -> BTreeSet<String> {
        self.default_roles
            .iter()
            .chain(self.attribute_value_to_groups.values().flatten())
            .cloned()
            .collect()
    }
}
