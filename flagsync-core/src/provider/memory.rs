//! In-process provider
//!
//! Holds configuration in memory and lets the host push "remote"
//! configuration explicitly. Used for embedding hosts that receive flag
//! values through their own transport, and as the substitute provider in
//! tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use flagsync_utils::{FlagsyncError, Result};

use super::{ConfigurationFetched, FlagProvider, FlagStore, SetupHooks, SetupOptions};
use crate::flags::{FlagDefinition, FlagValue, FreezeLevel};
use crate::targeting::CustomPropertyValue;

pub struct InMemoryProvider {
    store: FlagStore,
    hooks: Mutex<Option<SetupHooks>>,
    setup_calls: AtomicUsize,
    last_setup: Mutex<Option<(String, SetupOptions)>>,
    /// Applied as a network configuration during setup
    initial_remote: Option<HashMap<String, FlagValue>>,
    setup_delay: Option<Duration>,
    setup_failure: Option<String>,
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self {
            store: FlagStore::new(),
            hooks: Mutex::new(None),
            setup_calls: AtomicUsize::new(0),
            last_setup: Mutex::new(None),
            initial_remote: None,
            setup_delay: None,
            setup_failure: None,
        }
    }

    /// Apply these values from the network while setting up
    pub fn with_remote_values<I, K, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FlagValue>,
    {
        self.initial_remote = Some(
            values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Delay setup resolution
    pub fn with_setup_delay(mut self, delay: Duration) -> Self {
        self.setup_delay = Some(delay);
        self
    }

    /// Reject setup with this message
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.setup_failure = Some(message.into());
        self
    }

    /// Apply a configuration as if it had arrived from the network
    ///
    /// Returns false when setup has not run yet, so nobody was notified.
    pub fn apply_remote<I, K, V>(&self, values: I) -> bool
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FlagValue>,
    {
        let mut merged = (*self.store.values()).clone();
        merged.extend(values.into_iter().map(|(k, v)| (k.into(), v.into())));
        let has_changes = self.store.apply(merged);
        self.notify(ConfigurationFetched::network(has_changes))
    }

    /// Report a failed fetch without applying anything
    pub fn fail_fetch(&self, details: impl Into<String>) -> bool {
        self.notify(ConfigurationFetched::failed(details))
    }

    /// Send an arbitrary notification, e.g. a cache application
    pub fn report(&self, event: ConfigurationFetched) -> bool {
        self.notify(event)
    }

    pub fn setup_calls(&self) -> usize {
        self.setup_calls.load(Ordering::SeqCst)
    }

    /// Credential and options from the most recent setup call
    pub fn last_setup(&self) -> Option<(String, SetupOptions)> {
        self.last_setup.lock().clone()
    }

    pub fn properties(&self) -> std::collections::BTreeMap<String, CustomPropertyValue> {
        self.store.properties()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.store.is_registered(name)
    }

    fn notify(&self, event: ConfigurationFetched) -> bool {
        match self.hooks.lock().as_ref() {
            Some(hooks) => hooks.notify(event),
            None => false,
        }
    }
}

#[async_trait]
impl FlagProvider for InMemoryProvider {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn register(&self, namespace: &str, definitions: &[FlagDefinition]) {
        self.store.register(namespace, definitions);
    }

    fn set_custom_property(&self, name: &str, value: CustomPropertyValue) {
        self.store.set_property(name, value);
    }

    async fn setup(&self, credential: &str, options: &SetupOptions, hooks: SetupHooks) -> Result<()> {
        self.setup_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_setup.lock() = Some((credential.to_string(), options.clone()));
        *self.hooks.lock() = Some(hooks);

        self.notify(ConfigurationFetched::embedded());

        if let Some(delay) = self.setup_delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = &self.setup_failure {
            return Err(FlagsyncError::provider(message.clone()));
        }

        if let Some(values) = &self.initial_remote {
            let has_changes = self.store.apply(values.clone());
            self.notify(ConfigurationFetched::network(has_changes));
        }

        Ok(())
    }

    async fn fetch(&self) -> Result<()> {
        if self.hooks.lock().is_none() {
            return Err(FlagsyncError::fetch("provider has not been set up"));
        }
        self.notify(ConfigurationFetched::network(false));
        Ok(())
    }

    fn get_boolean(&self, name: &str, default: bool) -> Result<bool> {
        self.store
            .lookup(name, FlagValue::Bool(default))
            .map(|v| v.as_bool().unwrap_or(default))
    }

    fn get_string(&self, name: &str, default: &str) -> Result<String> {
        self.store
            .lookup(name, FlagValue::from(default))
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| default.to_string()))
    }

    fn get_number(&self, name: &str, default: f64) -> Result<f64> {
        self.store
            .lookup(name, FlagValue::Number(default))
            .map(|v| v.as_number().unwrap_or(default))
    }

    fn unfreeze(&self, name: &str) -> Result<()> {
        self.store.unfreeze(name)
    }

    fn unfreeze_all(&self) {
        self.store.unfreeze_all();
    }

    fn unfreeze_level(&self, level: FreezeLevel) {
        let released = self.store.unfreeze_level(level);
        tracing::debug!(?level, released, "Released frozen flags");
    }
}
