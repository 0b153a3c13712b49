//! Per-request authentication: make the local account match what the trusted
//! upstream asserted, then remember the result in the session.
//!
//! Flow: session hit → resolve identity → lookup → create or reuse →
//! profile update → role assignment → commit to session.

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::assertion::IdentityAssertion;
use super::principal::{Principal, ProfileUpdate};
use super::provider::{normalize_user_id, TrustedIdentity};
use super::request_context::RequestHeaders;
use super::resolver::{effective_roles, ResolvedRoles};
use super::session::SessionStore;
use crate::config::{ActiveConfig, ConfigLoader};
use crate::directory::Directory;
use crate::error::{AuthError, DirectoryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginKind {
    /// The session already carried a principal; nothing else ran.
    SessionHit,
    Created,
    Existing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated {
    pub principal: Principal,
    pub kind: LoginKind,
}

pub struct IdentityReconciler {
    config: Arc<ConfigLoader>,
    directory: Arc<dyn Directory>,
    identity: Arc<dyn TrustedIdentity>,
}

impl IdentityReconciler {
    pub fn new(config: Arc<ConfigLoader>, directory: Arc<dyn Directory>, identity: Arc<dyn TrustedIdentity>) -> Self {
        Self { config, directory, identity }
    }

    pub fn config(&self) -> &Arc<ConfigLoader> { &self.config }

    pub fn authenticate(&self, request: &RequestHeaders, session: &dyn SessionStore) -> Result<Authenticated, AuthError> {
        if let Some(principal) = session.principal() {
            debug!(user = %principal.user_id, "already logged in");
            return Ok(Authenticated { principal, kind: LoginKind::SessionHit });
        }

        let Some(raw_id) = self.identity.asserted_principal(request) else {
            debug!(request_id = ?request.request_id, "no trusted identity asserted");
            return Err(AuthError::NoIdentityAsserted);
        };
        let user_id = normalize_user_id(&raw_id);
        if user_id.is_empty() {
            return Err(AuthError::NoIdentityAsserted);
        }

        let config = self.config.current();
        let assertion = IdentityAssertion::from_request(&user_id, request, &config);

        let (mut principal, kind) = match self.lookup(&user_id)? {
            Some(p) => (p, LoginKind::Existing),
            None => self.create(&user_id, &config)?,
        };
        let created = kind == LoginKind::Created;

        if created || config.settings.update_info {
            self.update_profile(&mut principal, &assertion);
        }
        if created || config.settings.update_roles {
            self.assign_roles(&mut principal, &assertion, &config);
        }
        if config.settings.update_last_login {
            if let Err(e) = self.directory.record_login(&user_id, Utc::now()) {
                warn!(user = %user_id, error = %e, "could not record login time");
            }
        }

        info!(user = %user_id, kind = ?kind, groups = principal.groups.len(), "logging in user");
        session.set_principal(principal.clone());
        session.clear_logged_out();
        Ok(Authenticated { principal, kind })
    }

    fn lookup(&self, user_id: &str) -> Result<Option<Principal>, AuthError> {
        match self.directory.find_user(user_id) {
            Ok(found) => {
                if found.is_none() {
                    debug!(user = %user_id, "no account exists");
                }
                Ok(found)
            }
            Err(e) => {
                error!(user = %user_id, error = %e, "error getting user");
                Err(unavailable(user_id, &e))
            }
        }
    }

    /// Create the account. When creation fails, another request may have
    /// created the same account first, so look it up once more and reuse it.
    fn create(&self, user_id: &str, config: &ActiveConfig) -> Result<(Principal, LoginKind), AuthError> {
        if !config.settings.create_users {
            debug!(user = %user_id, "account creation disabled, authentication fails");
            return Err(AuthError::UnknownPrincipal(user_id.to_string()));
        }
        info!(user = %user_id, "creating user account");
        let failure = match self.directory.create_user(user_id) {
            Ok(p) => return Ok((p, LoginKind::Created)),
            Err(e) => e,
        };
        match &failure {
            DirectoryError::AlreadyExists(_) => {
                debug!(user = %user_id, "account created concurrently, reusing it");
            }
            other => {
                debug!(user = %user_id, error = %other, "create failed, checking whether the account exists anyway");
            }
        }
        match self.lookup(user_id)? {
            Some(p) => Ok((p, LoginKind::Existing)),
            None => {
                error!(user = %user_id, error = %failure, "create failed and no account exists");
                Err(unavailable(user_id, &failure))
            }
        }
    }

    /// At most one directory write, and only when a field changed. A failed
    /// write is logged and the stale values are kept.
    fn update_profile(&self, principal: &mut Principal, assertion: &IdentityAssertion) {
        let update = ProfileUpdate::diff(principal, assertion.full_name.as_deref(), assertion.email.as_deref());
        if update.is_empty() {
            debug!(user = %principal.user_id, "profile unchanged");
            return;
        }
        debug!(user = %principal.user_id, full_name = ?update.full_name, email = ?update.email, "updating profile");
        match self.directory.update_profile(&principal.user_id, &update) {
            Ok(()) => update.apply_to(principal),
            Err(e) => error!(user = %principal.user_id, error = %e, "couldn't update user profile"),
        }
    }

    fn assign_roles(&self, principal: &mut Principal, assertion: &IdentityAssertion, config: &ActiveConfig) {
        let desired = effective_roles(assertion, &config.rules);
        if desired.is_empty() {
            debug!(user = %principal.user_id, "no roles specified, not adding any roles");
        }
        for group in desired.iter() {
            if principal.groups.contains(group) {
                continue;
            }
            debug!(user = %principal.user_id, group = %group, "assigning role");
            match self.add_membership(group, &principal.user_id, config.settings.create_groups) {
                Ok(()) => {
                    principal.groups.insert(group.to_string());
                }
                Err(DirectoryError::GroupNotFound(_)) => {
                    warn!(user = %principal.user_id, group = %group, "attempted to add user to a role that does not exist");
                }
                Err(e) => {
                    error!(user = %principal.user_id, group = %group, error = %e, "could not add membership");
                }
            }
        }
        self.purge_roles(principal, assertion, &desired, config);
    }

    fn add_membership(&self, group: &str, user_id: &str, create_groups: bool) -> Result<(), DirectoryError> {
        match self.directory.add_membership(group, user_id) {
            Err(DirectoryError::GroupNotFound(_)) if create_groups => {
                info!(group = %group, "creating group asserted by identity provider");
                self.directory.create_group(group)?;
                self.directory.add_membership(group, user_id)
            }
            other => other,
        }
    }

    /// Revoke held groups that a purge rule ties to an attribute header this
    /// request carried, when that header no longer maps to them. A rule whose
    /// attribute is absent from the request revokes nothing.
    fn purge_roles(&self, principal: &mut Principal, assertion: &IdentityAssertion, desired: &ResolvedRoles, config: &ActiveConfig) {
        let stale: BTreeSet<String> = config
            .rules
            .purge_rules()
            .iter()
            .filter(|rule| assertion.has_attribute(&rule.attribute))
            .flat_map(|rule| rule.groups.iter())
            .filter(|g| principal.groups.contains(*g) && !desired.contains(g))
            .cloned()
            .collect();
        for group in stale {
            debug!(user = %principal.user_id, group = %group, "purging role");
            match self.directory.remove_membership(&group, &principal.user_id) {
                Ok(()) => {
                    principal.groups.remove(&group);
                }
                Err(e) => error!(user = %principal.user_id, group = %group, error = %e, "could not purge membership"),
            }
        }
    }
}

fn unavailable(user_id: &str, e: &DirectoryError) -> AuthError {
    AuthError::DirectoryUnavailable { user: user_id.to_string(), message: e.to_string() }
}
