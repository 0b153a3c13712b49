//! Trusted-header identity: principals, sessions, the attribute-to-group
//! resolver and the reconciler that ties them to the directory.
//! Keep the public surface thin and split implementation across sub-modules.

mod assertion;
mod principal;
mod provider;
mod reconciler;
mod request_context;
mod resolver;
mod session;

pub use assertion::IdentityAssertion;
pub use principal::{Principal, ProfileUpdate};
pub use provider::{normalize_user_id, RemoteUserHeader, TrustedIdentity};
pub use reconciler::{Authenticated, IdentityReconciler, LoginKind};
pub use request_context::{decode_header_value, RequestHeaders};
pub use resolver::{effective_roles, resolve, ResolvedRoles};
pub use session::{SessionHandle, SessionManager, SessionStore, SessionToken};

#[cfg(test)]
#[path = "identity_tests.rs"]
mod identity_tests;
