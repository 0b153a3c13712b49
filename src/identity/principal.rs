use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub groups: BTreeSet<String>,
}

impl Principal {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), ..Default::default() }
    }
}

/// Profile fields that differ from what the directory holds. Empty means no
/// write is needed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

impl ProfileUpdate {
    /// Compare each desired field against the stored principal on its own.
    pub fn diff(current: &Principal, full_name: Option<&str>, email: Option<&str>) -> Self {
        let changed = |want: Option<&str>, have: &Option<String>| match want {
            Some(w) if have.as_deref() != Some(w) => Some(w.to_string()),
            _ => None,
        };
        Self { full_name: changed(full_name, &current.full_name), email: changed(email, &current.email) }
    }

    pub fn is_empty(&self) -> bool { self.full_name.is_none() && self.email.is_none() }

    pub fn apply_to(&self, principal: &mut Principal) {
        if let Some(n) = &self.full_name { principal.full_name = Some(n.clone()); }
        if let Some(e) = &self.email { principal.email = Some(e.clone()); }
    }
}
