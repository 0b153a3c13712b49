//! The local user/group directory as seen by the reconciler.
//! Backends own persistence; the reconciler only sequences these calls.

mod memory;

pub use memory::InMemoryDirectory;

use chrono::{DateTime, Utc};

use crate::error::DirectoryError;
use crate::identity::{Principal, ProfileUpdate};

pub trait Directory: Send + Sync {
    fn find_user(&self, user_id: &str) -> Result<Option<Principal>, DirectoryError>;

    /// Create an empty account. Must report a duplicate as
    /// `DirectoryError::AlreadyExists` when the backend can tell.
    fn create_user(&self, user_id: &str) -> Result<Principal, DirectoryError>;

    fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<(), DirectoryError>;

    /// `DirectoryError::GroupNotFound` when the group does not exist.
    fn add_membership(&self, group: &str, user_id: &str) -> Result<(), DirectoryError>;

    fn remove_membership(&self, group: &str, user_id: &str) -> Result<(), DirectoryError>;

    fn create_group(&self, group: &str) -> Result<(), DirectoryError>;

    fn record_login(&self, _user_id: &str, _at: DateTime<Utc>) -> Result<(), DirectoryError> { Ok(()) }
}
