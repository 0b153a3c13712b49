use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

use super::assertion::IdentityAssertion;
use crate::config::{split_list, MappingRuleSet};

/// Groups a principal should hold. Empty means "no group changes".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedRoles {
    pub groups: BTreeSet<String>,
}

impl ResolvedRoles {
    pub fn contains(&self, group: &str) -> bool { self.groups.contains(group) }

    pub fn is_empty(&self) -> bool { self.groups.is_empty() }

    pub fn len(&self) -> usize { self.groups.len() }

    pub fn iter(&self) -> impl Iterator<Item = &str> { self.groups.iter().map(String::as_str) }

    fn extend<'a>(&mut self, groups: impl IntoIterator<Item = &'a String>) {
        self.groups.extend(groups.into_iter().map(|g| g.trim()).filter(|g| !g.is_empty()).map(str::to_string));
    }
}

/// Map asserted attribute values to local groups. Attribute names and values
/// match case-insensitively; values with no mapping are ignored.
pub fn resolve(assertion: &IdentityAssertion, rules: &MappingRuleSet) -> ResolvedRoles {
    let mut out = ResolvedRoles::default();
    if rules.watched_attributes().is_empty() {
        return out;
    }
    for (attribute, tokens) in &assertion.asserted_attribute_values {
        if !rules.is_watched(attribute) {
            continue;
        }
        for token in tokens.iter().flat_map(|t| split_list(t)) {
            if let Some(groups) = rules.groups_for(token) {
                debug!(attribute = %attribute, value = %token.to_lowercase(), groups = ?groups, "mapped attribute value");
                out.extend(groups);
            }
        }
    }
    out
}

/// Configured default roles plus everything `resolve` maps.
pub fn effective_roles(assertion: &IdentityAssertion, rules: &MappingRuleSet) -> ResolvedRoles {
    let mut out = resolve(assertion, rules);
    out.extend(rules.default_roles());
    out
}
