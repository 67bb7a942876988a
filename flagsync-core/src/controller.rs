//! Configuration synchronization controller
//!
//! Owns the Pending → Ready / Failed lifecycle, performs the one-time
//! provider setup and republishes a fresh [`FlagSnapshot`] to subscribers
//! each time the provider reports newly applied configuration.
//!
//! ```text
//! Pending --(setup resolves, no network config yet)--> Ready(defaults)
//! Pending --(provider applies config from network)---> Ready(snapshot)
//! Pending --(setup rejects)--------------------------> Failed(reason)
//! Ready   --(later network-applied config)-----------> Ready(new snapshot)
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

use flagsync_utils::{FlagsyncError, Result};

use crate::config::Environment;
use crate::flags::{FlagCatalog, FlagValue, FreezeLevel};
use crate::impression::{Impression, ImpressionHandler};
use crate::provider::{ConfigurationFetched, FetcherStatus, FlagProvider, SetupHooks, SetupOptions};
use crate::snapshot::FlagSnapshot;
use crate::state::{InitPhase, SnapshotAction, SyncEvent, SyncState, SyncView};
use crate::targeting::{CustomPropertyValue, UserContext};

/// Credential prefix of unedited sample configuration
const PLACEHOLDER_PREFIX: &str = "<YOUR-";

/// How flags are made known to the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Register every catalog namespace before setup
    #[default]
    Static,
    /// Look flags up by name without registering them
    Dynamic,
}

/// Options for [`ConfigurationSyncController::initialize`]
#[derive(Clone, Default)]
pub struct SyncOptions {
    /// Named in configuration errors
    pub environment: Environment,
    /// Passed through to the provider unchanged
    pub setup: SetupOptions,
    pub access_mode: AccessMode,
    /// Targeting properties pushed before setup
    pub custom_properties: Vec<(String, CustomPropertyValue)>,
    pub impression_handler: Option<Arc<dyn ImpressionHandler>>,
    /// Its properties are pushed before setup and attached to impressions
    pub user: Option<UserContext>,
}

impl std::fmt::Debug for SyncOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOptions")
            .field("environment", &self.environment)
            .field("setup", &self.setup)
            .field("access_mode", &self.access_mode)
            .field("custom_properties", &self.custom_properties)
            .field("impression_handler", &self.impression_handler.is_some())
            .field("user", &self.user)
            .finish()
    }
}

/// Reject credentials that cannot possibly work, before any provider I/O
pub fn validate_credential(credential: &str, environment: Environment) -> Result<()> {
    let credential = credential.trim();
    if credential.is_empty() {
        return Err(FlagsyncError::MissingCredential {
            environment: environment.to_string(),
        });
    }
    if credential.starts_with(PLACEHOLDER_PREFIX) {
        return Err(FlagsyncError::PlaceholderCredential {
            environment: environment.to_string(),
        });
    }
    Ok(())
}

/// Single-writer state behind the controller lock
struct Core {
    phase: InitPhase,
    state: SyncState,
    snapshot: FlagSnapshot,
    revision: u64,
}

#[derive(Clone, Default)]
struct ReaderContext {
    handler: Option<Arc<dyn ImpressionHandler>>,
    user: Option<UserContext>,
}

struct Shared<P> {
    catalog: FlagCatalog,
    provider: Arc<P>,
    core: Mutex<Core>,
    views: watch::Sender<SyncView>,
    reader: Mutex<ReaderContext>,
    parents: Arc<BTreeMap<String, String>>,
}

impl<P: FlagProvider> Shared<P> {
    /// Feed one event through the state machine and publish the result
    fn apply(&self, event: SyncEvent) {
        let mut core = self.core.lock();
        let transition = core.state.on_event(&event);
        if !transition.publish {
            return;
        }

        if transition.snapshot == SnapshotAction::Recompute {
            core.snapshot = self.evaluate_all();
        }
        core.state = transition.next;
        self.publish(&mut core);
    }

    /// Recompute and republish without changing state
    fn refresh(&self) {
        let mut core = self.core.lock();
        core.snapshot = self.evaluate_all();
        self.publish(&mut core);
    }

    fn publish(&self, core: &mut Core) {
        core.revision += 1;
        let view = SyncView {
            state: core.state.clone(),
            flags: core.snapshot.clone(),
            revision: core.revision,
        };
        tracing::trace!(revision = view.revision, state = ?view.state, "Publishing sync view");
        self.views.send_replace(view);
    }

    /// Read every declared flag from the provider
    fn evaluate_all(&self) -> FlagSnapshot {
        self.catalog
            .iter()
            .map(|(name, entry)| {
                let default = &entry.definition.default;
                let value = self.provider.evaluate(name, default).unwrap_or_else(|e| {
                    tracing::warn!("Falling back to default for {}: {}", name, e);
                    default.clone()
                });
                (name.clone(), value)
            })
            .collect()
    }

    fn on_configuration_fetched(&self, fetched: ConfigurationFetched) {
        match fetched.status {
            FetcherStatus::AppliedFromNetwork => {
                tracing::info!(has_changes = fetched.has_changes, "Feature flags updated from network");
            }
            FetcherStatus::AppliedFromEmbedded => {
                tracing::info!("Using default flag values");
            }
            FetcherStatus::AppliedFromCache => {
                tracing::debug!("Feature flags applied from cache");
            }
            FetcherStatus::ErrorFetchFailed => {
                tracing::warn!(
                    "Configuration fetch failed: {}",
                    fetched.error_details.as_deref().unwrap_or("unknown error")
                );
            }
        }
        self.apply(SyncEvent::Applied(fetched.status));
    }
}

/// Drain provider notifications in arrival order until the controller is gone
async fn listen<P: FlagProvider>(
    shared: Weak<Shared<P>>,
    mut rx: mpsc::UnboundedReceiver<ConfigurationFetched>,
) {
    while let Some(fetched) = rx.recv().await {
        match shared.upgrade() {
            Some(shared) => shared.on_configuration_fetched(fetched),
            None => break,
        }
    }
    tracing::debug!("Configuration listener stopped");
}

/// Mediates flag state between a [`FlagProvider`] and the rendering layer
pub struct ConfigurationSyncController<P> {
    shared: Arc<Shared<P>>,
}

impl<P> Clone for ConfigurationSyncController<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P: FlagProvider> ConfigurationSyncController<P> {
    /// Create a controller serving the catalog's defaults until initialized
    pub fn new(catalog: FlagCatalog, provider: Arc<P>) -> Self {
        let defaults = catalog.defaults();
        let (views, _) = watch::channel(SyncView::initial(defaults.clone()));
        let parents = Arc::new(catalog.parents());

        Self {
            shared: Arc::new(Shared {
                catalog,
                provider,
                core: Mutex::new(Core {
                    phase: InitPhase::NotStarted,
                    state: SyncState::Pending,
                    snapshot: defaults,
                    revision: 0,
                }),
                views,
                reader: Mutex::new(ReaderContext::default()),
                parents,
            }),
        }
    }

    pub fn catalog(&self) -> &FlagCatalog {
        &self.shared.catalog
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.shared.provider
    }

    /// Receive every published view, starting with the current one
    pub fn subscribe(&self) -> watch::Receiver<SyncView> {
        self.shared.views.subscribe()
    }

    /// Latest published view
    pub fn current(&self) -> SyncView {
        self.shared.views.borrow().clone()
    }

    pub fn phase(&self) -> InitPhase {
        self.shared.core.lock().phase
    }

    /// Run the one-time provider setup
    ///
    /// Only the first call does any work. Returns `Err` only for an unusable
    /// credential; provider failures are reported through the `Failed` state.
    pub async fn initialize(&self, credential: &str, options: SyncOptions) -> Result<()> {
        {
            let mut core = self.shared.core.lock();
            if !core.phase.begin() {
                tracing::debug!(phase = ?core.phase, "Flag sync already initialized, ignoring");
                return Ok(());
            }
            core.state = SyncState::Pending;
            self.shared.publish(&mut core);
        }

        let provider = &self.shared.provider;
        tracing::info!(
            provider = provider.name(),
            environment = %options.environment,
            access_mode = ?options.access_mode,
            flags = self.shared.catalog.len(),
            "Initializing feature flags"
        );

        *self.shared.reader.lock() = ReaderContext {
            handler: options.impression_handler.clone(),
            user: options.user.clone(),
        };

        if let Err(e) = validate_credential(credential, options.environment) {
            tracing::error!("Failed to initialize feature flags: {}", e);
            self.shared.apply(SyncEvent::SetupFailed(e.to_string()));
            self.settle();
            return Err(e);
        }

        let user_properties = options
            .user
            .as_ref()
            .map(UserContext::custom_properties)
            .unwrap_or_default();
        for (name, value) in user_properties.into_iter().chain(options.custom_properties) {
            provider.set_custom_property(&name, value);
        }
        if let Some(user) = &options.user {
            tracing::info!(email = %user.email, tier = %user.tier, "Custom properties set");
        }

        if options.access_mode == AccessMode::Static {
            for namespace in self.shared.catalog.namespaces() {
                provider.register(namespace, &self.shared.catalog.namespace_definitions(namespace));
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(listen(Arc::downgrade(&self.shared), rx));

        match provider.setup(credential, &options.setup, SetupHooks::new(tx)).await {
            Ok(()) => {
                tracing::info!("Feature flags initialized successfully");
                self.shared.apply(SyncEvent::SetupCompleted);
            }
            Err(e) => {
                tracing::error!("Failed to initialize feature flags: {}", e);
                self.shared.apply(SyncEvent::SetupFailed(e.reason()));
            }
        }

        self.settle();
        Ok(())
    }

    fn settle(&self) {
        self.shared.core.lock().phase.settle();
    }

    /// Release a frozen flag, fetch, and republish
    pub async fn unfreeze(&self, name: &str) -> Result<()> {
        self.shared.provider.unfreeze(name)?;
        self.fetch_and_refresh().await;
        Ok(())
    }

    /// Release every frozen flag, fetch, and republish
    pub async fn unfreeze_all(&self) {
        self.shared.provider.unfreeze_all();
        self.fetch_and_refresh().await;
    }

    /// The application came back to the foreground
    ///
    /// Releases `until_foreground` flags, fetches, and republishes.
    /// `until_launch` flags keep their captured values.
    pub async fn on_foreground(&self) {
        tracing::debug!("Application foregrounded");
        self.shared.provider.unfreeze_level(FreezeLevel::UntilForeground);
        self.fetch_and_refresh().await;
    }

    async fn fetch_and_refresh(&self) {
        if let Err(e) = self.shared.provider.fetch().await {
            tracing::warn!("Fetch after releasing frozen flags failed: {}", e);
        }
        self.shared.refresh();
    }

    /// Read access to the latest snapshot
    pub fn reader(&self) -> FlagReader {
        self.reader_for(self.current().flags)
    }

    /// Read access to a specific snapshot, e.g. one received from [`Self::subscribe`]
    pub fn reader_for(&self, snapshot: FlagSnapshot) -> FlagReader {
        let ctx = self.shared.reader.lock().clone();
        FlagReader {
            snapshot,
            handler: ctx.handler,
            user: ctx.user,
            parents: Arc::clone(&self.shared.parents),
        }
    }
}

/// Pure reads over one snapshot, reporting an impression per read
#[derive(Clone)]
pub struct FlagReader {
    snapshot: FlagSnapshot,
    handler: Option<Arc<dyn ImpressionHandler>>,
    user: Option<UserContext>,
    parents: Arc<BTreeMap<String, String>>,
}

impl FlagReader {
    pub fn new(snapshot: FlagSnapshot) -> Self {
        Self {
            snapshot,
            handler: None,
            user: None,
            parents: Arc::default(),
        }
    }

    /// Take parent links from the catalog for [`Self::is_effective`]
    pub fn with_catalog(mut self, catalog: &FlagCatalog) -> Self {
        self.parents = Arc::new(catalog.parents());
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn ImpressionHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn with_user(mut self, user: UserContext) -> Self {
        self.user = Some(user);
        self
    }

    pub fn snapshot(&self) -> &FlagSnapshot {
        &self.snapshot
    }

    /// True only for a boolean flag currently set to true
    pub fn is_enabled(&self, name: &str) -> bool {
        self.get_value(name)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Enabled, and so is every flag up its parent chain
    pub fn is_effective(&self, name: &str) -> bool {
        let mut current = name;
        loop {
            if !self.is_enabled(current) {
                return false;
            }
            match self.parents.get(current) {
                Some(parent) => current = parent,
                None => return true,
            }
        }
    }

    pub fn get_value(&self, name: &str) -> Option<FlagValue> {
        let value = self.snapshot.get(name)?.clone();
        self.report(name, &value);
        Some(value)
    }

    pub fn get_string(&self, name: &str) -> Option<String> {
        self.get_value(name).and_then(|v| v.as_str().map(str::to_string))
    }

    pub fn get_number(&self, name: &str) -> Option<f64> {
        self.get_value(name).and_then(|v| v.as_number())
    }

    fn report(&self, name: &str, value: &FlagValue) {
        let Some(handler) = &self.handler else {
            return;
        };
        let mut impression = Impression::new(name, value.clone());
        if let Some(user) = &self.user {
            impression = impression.for_user(user);
        }
        handler.on_impression(&impression);
    }
}

impl std::fmt::Debug for FlagReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlagReader")
            .field("snapshot", &self.snapshot)
            .field("handler", &self.handler.is_some())
            .field("user", &self.user)
            .field("parents", &self.parents.len())
            .finish()
    }
}
