use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::Directory;
use crate::error::DirectoryError;
use crate::identity::{Principal, ProfileUpdate};

#[derive(Debug, Clone)]
struct UserRecord {
    principal: Principal,
    last_login: Option<DateTime<Utc>>,
    previous_login: Option<DateTime<Utc>>,
}

/// Process-local directory. Counts mutating calls so hosts and tests can see
/// how much write traffic authentication produced.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
    groups: RwLock<BTreeSet<String>>,
    writes: AtomicU64,
}

impl InMemoryDirectory {
    pub fn with_groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let dir = Self::default();
        dir.groups.write().extend(groups.into_iter().map(Into::into));
        dir
    }

    /// Seed an account without counting it as a write.
    pub fn insert_user(&self, principal: Principal) {
        let record = UserRecord { principal: principal.clone(), last_login: None, previous_login: None };
        self.users.write().insert(principal.user_id, record);
    }

    pub fn user(&self, user_id: &str) -> Option<Principal> {
        self.users.read().get(user_id).map(|r| r.principal.clone())
    }

    pub fn user_count(&self) -> usize { self.users.read().len() }

    pub fn has_group(&self, group: &str) -> bool { self.groups.read().contains(group) }

    /// Latest and previous login stamps.
    pub fn logins(&self, user_id: &str) -> Option<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
        self.users.read().get(user_id).map(|r| (r.last_login, r.previous_login))
    }

    pub fn write_count(&self) -> u64 { self.writes.load(Ordering::Relaxed) }

    fn bump(&self) { self.writes.fetch_add(1, Ordering::Relaxed); }
}

impl Directory for InMemoryDirectory {
    fn find_user(&self, user_id: &str) -> Result<Option<Principal>, DirectoryError> {
        Ok(self.user(user_id))
    }

    fn create_user(&self, user_id: &str) -> Result<Principal, DirectoryError> {
        let mut users = self.users.write();
        if users.contains_key(user_id) {
            return Err(DirectoryError::AlreadyExists(user_id.to_string()));
        }
        let principal = Principal::new(user_id);
        users.insert(
            user_id.to_string(),
            UserRecord { principal: principal.clone(), last_login: None, previous_login: None },
        );
        self.bump();
        debug!(user = %user_id, "directory: account created");
        Ok(principal)
    }

    fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<(), DirectoryError> {
        let mut users = self.users.write();
        let rec = users.get_mut(user_id).ok_or_else(|| DirectoryError::UserNotFound(user_id.to_string()))?;
        update.apply_to(&mut rec.principal);
        self.bump();
        Ok(())
    }

    fn add_membership(&self, group: &str, user_id: &str) -> Result<(), DirectoryError> {
        if !self.groups.read().contains(group) {
            return Err(DirectoryError::GroupNotFound(group.to_string()));
        }
        let mut users = self.users.write();
        let rec = users.get_mut(user_id).ok_or_else(|| DirectoryError::UserNotFound(user_id.to_string()))?;
        rec.principal.groups.insert(group.to_string());
        self.bump();
        Ok(())
    }

    fn remove_membership(&self, group: &str, user_id: &str) -> Result<(), DirectoryError> {
        let mut users = self.users.write();
        let rec = users.get_mut(user_id).ok_or_else(|| DirectoryError::UserNotFound(user_id.to_string()))?;
        rec.principal.groups.remove(group);
        self.bump();
        Ok(())
    }

    fn create_group(&self, group: &str) -> Result<(), DirectoryError> {
        if self.groups.write().insert(group.to_string()) {
            self.bump();
        }
        Ok(())
    }

    fn record_login(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), DirectoryError> {
        let mut users = self.users.write();
        let rec = users.get_mut(user_id).ok_or_else(|| DirectoryError::UserNotFound(user_id.to_string()))?;
        rec.previous_login = rec.last_login.replace(at);
        self.bump();
        Ok(())
    }
}
