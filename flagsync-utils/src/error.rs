//! Error types for flagsync
//!
//! Provides a unified error type used across all flagsync crates.

use std::path::PathBuf;

/// Main error type for flagsync operations
#[derive(Debug, thiserror::Error)]
pub enum FlagsyncError {
    // === IO Errors ===

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("No SDK key configured for the {environment} environment. Set `credential` in config.toml before starting.")]
    MissingCredential { environment: String },

    #[error("You haven't yet inserted your SDK key for the {environment} environment - flag values will stay at their defaults until you do. Set `credential` in config.toml.")]
    PlaceholderCredential { environment: String },

    // === Provider Errors ===

    #[error("Provider setup failed: {0}")]
    ProviderSetup(String),

    #[error("Configuration fetch failed: {0}")]
    Fetch(String),

    #[error("Watch error: {0}")]
    Watch(String),

    // === Flag Errors ===

    #[error("Unknown flag: {0}")]
    UnknownFlag(String),

    #[error("Flag already registered: {0}")]
    DuplicateFlag(String),

    #[error("Invalid flag definition for {flag}: {message}")]
    InvalidFlag { flag: String, message: String },

    #[error("Flag {flag} holds a {actual} value, expected {expected}")]
    TypeMismatch {
        flag: String,
        expected: String,
        actual: String,
    },

    #[error("Failed to evaluate flag {flag}: {message}")]
    Evaluation { flag: String, message: String },

    // === Serialization Errors ===

    #[error("Serialization error: {0}")]
    Serialization(String),

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlagsyncError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a provider setup error
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::ProviderSetup(msg.into())
    }

    /// Create a fetch error
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Create an evaluation error
    pub fn evaluation(flag: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Evaluation {
            flag: flag.into(),
            message: msg.into(),
        }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this error was detected locally from bad configuration
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::ConfigInvalid { .. }
                | Self::ConfigNotFound(_)
                | Self::MissingCredential { .. }
                | Self::PlaceholderCredential { .. }
        )
    }

    /// Check if a full reload could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderSetup(_) | Self::Fetch(_))
    }

    /// Human-readable reason surfaced to subscribers.
    ///
    /// Provider failures carry the provider's own message unchanged.
    pub fn reason(&self) -> String {
        match self {
            Self::ProviderSetup(msg) | Self::Fetch(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type alias using FlagsyncError
pub type Result<T> = std::result::Result<T, FlagsyncError>;
