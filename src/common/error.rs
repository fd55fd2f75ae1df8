//! Error types for the application.

use thiserror::Error;

/// Failures surfaced by the relay pipeline and the admin operations.
///
/// Every platform call, registry call and delivery maps into one of these.
/// Routing treats all of them as local to a single destination.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelayError {
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },
}

impl RelayError {
    pub fn permission(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Persistence failures from a key-value backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to (de)serialize record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record {key}: {message}")]
    Corrupt { key: String, message: String },
}

impl StoreError {
    /// A stored record that no longer decodes into its type.
    pub fn corrupt(key: impl ToString, reason: impl std::fmt::Display) -> Self {
        Self::Corrupt {
            key: key.to_string(),
            message: reason.to_string(),
        }
    }
}

impl From<StoreError> for RelayError {
    fn from(error: StoreError) -> Self {
        RelayError::transport(error.to_string())
    }
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {message}")]
    IoError { path: String, message: String },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Result type alias for relay operations.
pub type RelayResult<T> = std::result::Result<T, RelayError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
