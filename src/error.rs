//! Error model for configuration, directory access and authentication.
//! The typed enums are used inside the library; `AppError` is the flattened
//! form handed to the HTTP frontend, with a stable code string and a status.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Configuration could not be read or parsed. Never fatal after the first load.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("config source '{source_name}' unreadable: {message}")]
    Unreadable { source_name: String, message: String },
    #[error("invalid value for '{key}': '{value}'")]
    InvalidValue { key: String, value: String },
    #[error("malformed mapping rule '{key}': {reason}")]
    MalformedRule { key: String, reason: String },
}

/// Failures reported by a directory backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("account '{0}' already exists")]
    AlreadyExists(String),
    #[error("account '{0}' not found")]
    UserNotFound(String),
    #[error("group '{0}' not found")]
    GroupNotFound(String),
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a failed authentication. None of these are server faults from
/// the caller's point of view; they all mean "not authenticated".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("no trusted identity asserted")]
    NoIdentityAsserted,
    #[error("unknown principal '{0}' and account creation is disabled")]
    UnknownPrincipal(String),
    #[error("directory unavailable while authenticating '{user}': {message}")]
    DirectoryUnavailable { user: String, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    Auth { code: String, message: String },
    Unavailable { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Unavailable { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Unavailable { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::Auth { .. } => 401,
            AppError::Unavailable { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::NoIdentityAsserted => AppError::Auth { code: "no_identity".into(), message },
            AuthError::UnknownPrincipal(_) => AppError::Auth { code: "unknown_principal".into(), message },
            AuthError::DirectoryUnavailable { .. } => AppError::Unavailable { code: "directory_unavailable".into(), message },
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        let message = err.to_string();
        match err {
            ConfigError::Unreadable { .. } => AppError::Unavailable { code: "config_unreadable".into(), message },
            ConfigError::InvalidValue { .. } | ConfigError::MalformedRule { .. } => {
                AppError::UserInput { code: "config_invalid".into(), message }
            }
        }
    }
}

impl From<getrandom::Error> for AppError {
    fn from(err: getrandom::Error) -> Self {
        AppError::Internal { code: "entropy_unavailable".into(), message: err.to_string() }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
