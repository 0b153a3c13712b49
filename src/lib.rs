//! Trusted-header authentication: map upstream identity assertions onto local
//! accounts and group memberships, driven by a hot-reloadable properties file.

pub mod config;
pub mod directory;
pub mod error;
pub mod identity;
pub mod server;

pub use config::{ActiveConfig, ConfigLoader};
pub use directory::{Directory, InMemoryDirectory};
pub use error::{AppError, AuthError, ConfigError, DirectoryError};
pub use identity::{Authenticated, IdentityReconciler, LoginKind, Principal};
