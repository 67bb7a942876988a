//! Configuration schema structs

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use flagsync_utils::{FlagsyncError, Result};

use crate::controller::AccessMode;
use crate::flags::{FlagDefinition, FlagValue, FreezeLevel};
use crate::provider::{Endpoints, SetupOptions, Verbosity};

/// Environment variable selecting the active environment
pub const ENV_VAR: &str = "FLAGSYNC_ENV";

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sync: SyncConfig,
    /// Per-environment credentials and default overrides, keyed by environment name
    pub environments: BTreeMap<String, EnvironmentConfig>,
    pub flags: Vec<FlagEntry>,
    pub provider: ProviderConfig,
}

/// Synchronization settings passed through to the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// SDK key used when the environment has none of its own
    pub credential: Option<String>,
    pub environment: Option<Environment>,
    pub fetch_interval_secs: u64,
    pub verbosity: Verbosity,
    pub access_mode: AccessMode,
    pub endpoints: Endpoints,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            credential: None,
            environment: None,
            fetch_interval_secs: 60,
            verbosity: Verbosity::Default,
            access_mode: AccessMode::Static,
            endpoints: Endpoints::default(),
        }
    }
}

impl SyncConfig {
    pub fn setup_options(&self) -> SetupOptions {
        SetupOptions {
            fetch_interval: Duration::from_secs(self.fetch_interval_secs),
            endpoints: self.endpoints.clone(),
            verbosity: self.verbosity,
        }
    }
}

/// Settings for one deployment environment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub credential: Option<String>,
    /// Qualified flag name to default override
    pub overrides: BTreeMap<String, FlagValue>,
}

/// A flag declared in the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagEntry {
    /// Empty for top-level flags
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    pub default: FlagValue,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FlagValue>,
    #[serde(default)]
    pub freeze: FreezeLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Gating boolean flag, declared earlier in the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl FlagEntry {
    pub fn definition(&self) -> FlagDefinition {
        FlagDefinition {
            name: self.name.clone(),
            default: self.default.clone(),
            options: self.options.clone(),
            freeze: self.freeze,
            description: self.description.clone(),
            parent: self.parent.clone(),
        }
    }
}

/// Bundled provider settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Flag values file for the file-backed provider; defaults to the config dir
    pub flags_file: Option<PathBuf>,
}

impl ProviderConfig {
    pub fn flags_file(&self) -> PathBuf {
        self.flags_file.clone().unwrap_or_else(flagsync_utils::flags_file)
    }
}

/// Deployment environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    #[default]
    Production,
}

impl Environment {
    pub const ALL: [Environment; 3] = [
        Environment::Development,
        Environment::Staging,
        Environment::Production,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Environment::Development => "Development",
            Environment::Staging => "Staging",
            Environment::Production => "Production",
        }
    }

    /// Read `FLAGSYNC_ENV`; unset or empty yields `None`
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var(ENV_VAR) {
            Ok(value) if !value.trim().is_empty() => value.parse().map(Some),
            _ => Ok(None),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = FlagsyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" | "stg" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(FlagsyncError::config(format!(
                "unknown environment '{}' (expected development, staging or production)",
                other
            ))),
        }
    }
}
