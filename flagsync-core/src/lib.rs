//! flagsync-core: client-side flag-state synchronization
//!
//! A [`ConfigurationSyncController`] runs a one-time setup against a
//! [`FlagProvider`], serves declared defaults until configuration arrives,
//! and republishes a fresh [`FlagSnapshot`] whenever the provider applies
//! configuration from the network.

pub mod config;
pub mod controller;
pub mod flags;
pub mod impression;
pub mod provider;
pub mod snapshot;
pub mod state;
pub mod targeting;

pub use config::{AppConfig, ConfigLoader, Environment};
pub use controller::{
    validate_credential, AccessMode, ConfigurationSyncController, FlagReader, SyncOptions,
};
pub use flags::{qualified_name, FlagCatalog, FlagDefinition, FlagKind, FlagValue, FreezeLevel};
pub use impression::{Impression, ImpressionHandler, ImpressionTracker, VariantResult};
pub use provider::{
    ConfigurationFetched, Endpoints, FetcherStatus, FileProvider, FlagProvider, InMemoryProvider,
    SetupHooks, SetupOptions, Verbosity,
};
pub use snapshot::FlagSnapshot;
pub use state::{InitPhase, SyncState, SyncView};
pub use targeting::{CustomPropertyValue, UserContext, UserContextStore, UserTier};
