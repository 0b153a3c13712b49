use std::collections::BTreeMap;

use super::request_context::RequestHeaders;
use crate::config::{split_list, ActiveConfig};

/// What the upstream identity layer asserted about the caller for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityAssertion {
    pub principal_id: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    /// Watched attribute header (lower-cased name) to its raw tokens.
    pub asserted_attribute_values: BTreeMap<String, Vec<String>>,
}

impl IdentityAssertion {
    pub fn new(principal_id: impl Into<String>) -> Self {
        Self { principal_id: principal_id.into(), ..Default::default() }
    }

    /// Builder for tests and hosts that assert attributes directly.
    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.asserted_attribute_values
            .entry(name.trim().to_lowercase())
            .or_default()
            .extend(split_list(value).map(str::to_string));
        self
    }

    /// Collect profile and watched attribute headers for an already
    /// normalized principal id.
    pub fn from_request(principal_id: &str, request: &RequestHeaders, config: &ActiveConfig) -> Self {
        let header = |name: &Option<String>| {
            name.as_deref().and_then(|h| request.get(h)).map(str::trim).filter(|v| !v.is_empty())
        };
        let full_name = Some(header(&config.settings.full_name_header).unwrap_or(principal_id).to_string());
        let email = header(&config.settings.email_header).map(str::to_lowercase);

        let mut assertion = Self { principal_id: principal_id.to_string(), full_name, email, ..Default::default() };
        for (name, value) in request.iter() {
            if config.rules.is_watched(name) {
                assertion = assertion.with_attribute(name, value);
            }
        }
        assertion
    }

    /// True when the attribute header was present on the request, even if
    /// its value was empty.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.asserted_attribute_values.contains_key(&name.trim().to_lowercase())
    }
}
