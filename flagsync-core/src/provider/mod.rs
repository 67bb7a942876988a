//! Flag provider boundary
//!
//! The controller never evaluates targeting rules itself: it delegates to a
//! [`FlagProvider`], which applies configuration (from the network, a cache
//! or embedded defaults) and reports each application on a channel.

mod file;
mod memory;
mod store;
mod watcher;

pub use file::FileProvider;
pub use memory::InMemoryProvider;
pub use store::{flatten_flag_table, FlagStore};
pub use watcher::FlagFileWatcher;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use flagsync_utils::{FlagsyncError, Result};

use crate::flags::{FlagDefinition, FlagKind, FlagValue, FreezeLevel};
use crate::targeting::CustomPropertyValue;

/// Where an applied configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetcherStatus {
    /// Defaults compiled into the application
    AppliedFromEmbedded,
    /// Configuration cached by a previous session
    AppliedFromCache,
    /// Fresh configuration from the remote service
    AppliedFromNetwork,
    /// A fetch was attempted and failed; nothing was applied
    ErrorFetchFailed,
}

/// Notification sent by a provider each time it applies configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationFetched {
    pub status: FetcherStatus,
    pub created_at: DateTime<Utc>,
    pub has_changes: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl ConfigurationFetched {
    pub fn new(status: FetcherStatus, has_changes: bool) -> Self {
        Self {
            status,
            created_at: Utc::now(),
            has_changes,
            error_details: None,
        }
    }

    pub fn embedded() -> Self {
        Self::new(FetcherStatus::AppliedFromEmbedded, false)
    }

    pub fn network(has_changes: bool) -> Self {
        Self::new(FetcherStatus::AppliedFromNetwork, has_changes)
    }

    pub fn failed(details: impl Into<String>) -> Self {
        Self {
            error_details: Some(details.into()),
            ..Self::new(FetcherStatus::ErrorFetchFailed, false)
        }
    }
}

/// Sending half of the configuration-applied channel
pub type ConfigurationSender = mpsc::UnboundedSender<ConfigurationFetched>;

/// Callbacks handed to a provider during setup
#[derive(Debug, Clone)]
pub struct SetupHooks {
    on_configuration_fetched: ConfigurationSender,
}

impl SetupHooks {
    pub fn new(on_configuration_fetched: ConfigurationSender) -> Self {
        Self {
            on_configuration_fetched,
        }
    }

    /// Report an applied configuration; false once nobody is listening
    pub fn notify(&self, event: ConfigurationFetched) -> bool {
        self.on_configuration_fetched.send(event).is_ok()
    }
}

/// Optional endpoints for self-managed deployments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub configuration: Option<String>,
    pub state: Option<String>,
    pub analytics: Option<String>,
    pub notifications: Option<String>,
}

impl Endpoints {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("configuration", self.configuration.as_deref()),
            ("state", self.state.as_deref()),
            ("analytics", self.analytics.as_deref()),
            ("notifications", self.notifications.as_deref()),
        ]
        .into_iter()
        .filter_map(|(name, url)| url.map(|u| (name, u)))
    }
}

/// Provider log verbosity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    #[default]
    Default,
    Debug,
}

/// Options passed through unchanged to the provider's setup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupOptions {
    pub fetch_interval: Duration,
    pub endpoints: Endpoints,
    pub verbosity: Verbosity,
}

impl Default for SetupOptions {
    fn default() -> Self {
        Self {
            fetch_interval: Duration::from_secs(60),
            endpoints: Endpoints::default(),
            verbosity: Verbosity::Default,
        }
    }
}

/// External flag-evaluation client
#[async_trait]
pub trait FlagProvider: Send + Sync + 'static {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Declare known flags ahead of time (static access path)
    fn register(&self, namespace: &str, definitions: &[FlagDefinition]);

    /// Set a targeting property evaluated by the provider's rules
    fn set_custom_property(&self, name: &str, value: CustomPropertyValue);

    /// Start the provider; resolves once initial configuration handling is done
    async fn setup(&self, credential: &str, options: &SetupOptions, hooks: SetupHooks) -> Result<()>;

    /// Ask the provider to fetch configuration now
    async fn fetch(&self) -> Result<()>;

    fn get_boolean(&self, name: &str, default: bool) -> Result<bool>;

    fn get_string(&self, name: &str, default: &str) -> Result<String>;

    fn get_number(&self, name: &str, default: f64) -> Result<f64>;

    /// Release a frozen flag so its next evaluation picks up the latest value
    fn unfreeze(&self, name: &str) -> Result<()> {
        Err(FlagsyncError::UnknownFlag(name.to_string()))
    }

    fn unfreeze_all(&self) {}

    /// Release every flag frozen at `level`
    fn unfreeze_level(&self, _level: FreezeLevel) {}

    /// Dynamic lookup dispatched on the kind of the default
    fn evaluate(&self, name: &str, default: &FlagValue) -> Result<FlagValue> {
        match default {
            FlagValue::Bool(b) => self.get_boolean(name, *b).map(FlagValue::Bool),
            FlagValue::String(s) => self.get_string(name, s).map(FlagValue::String),
            FlagValue::Number(n) => self.get_number(name, *n).map(FlagValue::Number),
        }
    }
}

/// Map a stored value to the requested kind
pub(crate) fn expect_kind(name: &str, value: FlagValue, kind: FlagKind) -> Result<FlagValue> {
    if value.kind() == kind {
        Ok(value)
    } else {
        Err(FlagsyncError::TypeMismatch {
            flag: name.to_string(),
            expected: kind.to_string(),
            actual: value.kind().to_string(),
        })
    }
}
