//! Error types for swcache
//!
//! All modules use `SwCacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for swcache operations
pub type SwCacheResult<T> = Result<T, SwCacheError>;

/// All errors that can occur in swcache
#[derive(Error, Debug)]
pub enum SwCacheError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Deployment errors
    #[error("Invalid generation tag '{tag}': {reason}")]
    InvalidGeneration { tag: String, reason: String },

    #[error("Placeholder {placeholder} not found in {path}")]
    PlaceholderMissing { placeholder: String, path: PathBuf },

    #[error("Invalid scope URL {scope}: {reason}")]
    InvalidScope { scope: String, reason: String },

    // Lifecycle errors
    #[error("Installation of generation {generation} failed: {reason}")]
    InstallFailed { generation: String, reason: String },

    #[error("Invalid lifecycle transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("No waiting generation to activate")]
    NothingWaiting,

    #[error("Unknown client: {0}")]
    UnknownClient(uuid::Uuid),

    // Network errors
    #[error("Network request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("Unsupported request method for network fetch: {0}")]
    UnsupportedMethod(String),

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    // Storage errors
    #[error("Cache storage error: {0}")]
    Storage(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl SwCacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a network error for a URL
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error came from the network rather than from storage or logic
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::UnsupportedMethod(_))
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::PlaceholderMissing { .. } => {
                Some("Check deploy.placeholder in config matches the token in the script")
            }
            Self::InvalidScope { .. } => Some("Scope URLs must be absolute and end with '/'"),
            Self::InstallFailed { .. } => {
                Some("The previous generation keeps serving; check the scope root is reachable")
            }
            Self::InvalidGeneration { .. } => {
                Some("Generation tags must be non-empty and must not contain ':'")
            }
            _ => None,
        }
    }
}
