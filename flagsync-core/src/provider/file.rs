//! File-backed provider
//!
//! Stand-in for a self-managed remote service: a TOML file of flag values
//! plays the part of the remote configuration. Every valid change to the
//! file is applied and reported as a network application.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use flagsync_utils::{FlagsyncError, Result};

use super::{
    flatten_flag_table, ConfigurationFetched, FlagFileWatcher, FlagProvider, FlagStore, SetupHooks,
    SetupOptions,
};
use crate::flags::{FlagDefinition, FlagValue, FreezeLevel};
use crate::targeting::CustomPropertyValue;

struct Shared {
    path: PathBuf,
    store: FlagStore,
    hooks: Mutex<Option<SetupHooks>>,
}

impl Shared {
    fn notify(&self, event: ConfigurationFetched) {
        if let Some(hooks) = self.hooks.lock().as_ref() {
            hooks.notify(event);
        }
    }

    /// Read and apply the file; `Ok(None)` when it does not exist
    fn load(&self) -> Result<Option<bool>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| FlagsyncError::FileRead {
            path: self.path.clone(),
            source: e,
        })?;
        let table: toml::Table = content.parse().map_err(|e: toml::de::Error| {
            FlagsyncError::ConfigInvalid {
                path: self.path.clone(),
                message: e.to_string(),
            }
        })?;
        let values = flatten_flag_table(&table)?;

        Ok(Some(self.store.apply(values)))
    }

    /// Reload after a change, reporting the outcome to the controller
    fn reload(&self) {
        match self.load() {
            Ok(Some(has_changes)) => {
                tracing::info!(path = %self.path.display(), has_changes, "Flag file applied");
                self.notify(ConfigurationFetched::network(has_changes));
            }
            Ok(None) => {
                tracing::warn!(path = %self.path.display(), "Flag file missing, keeping previous values");
                self.notify(ConfigurationFetched::failed("flag file missing"));
            }
            Err(e) => {
                tracing::error!("Flag file reload failed (keeping previous): {}", e);
                self.notify(ConfigurationFetched::failed(e.to_string()));
            }
        }
    }
}

pub struct FileProvider {
    shared: Arc<Shared>,
    watch_task: Mutex<Option<JoinHandle<()>>>,
    watch: bool,
}

impl FileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            shared: Arc::new(Shared {
                path: path.into(),
                store: FlagStore::new(),
                hooks: Mutex::new(None),
            }),
            watch_task: Mutex::new(None),
            watch: true,
        }
    }

    /// Disable hot-reload; changes only apply on `fetch`
    pub fn without_watch(mut self) -> Self {
        self.watch = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    fn start_watching(&self) -> Result<()> {
        let watcher = FlagFileWatcher::new(&self.shared.path)?;
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(watcher.run(move || shared.reload()));
        *self.watch_task.lock() = Some(handle);
        Ok(())
    }
}

impl Drop for FileProvider {
    fn drop(&mut self) {
        if let Some(handle) = self.watch_task.lock().take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl FlagProvider for FileProvider {
    fn name(&self) -> &str {
        "file"
    }

    fn register(&self, namespace: &str, definitions: &[FlagDefinition]) {
        self.shared.store.register(namespace, definitions);
    }

    fn set_custom_property(&self, name: &str, value: CustomPropertyValue) {
        self.shared.store.set_property(name, value);
    }

    async fn setup(&self, credential: &str, options: &SetupOptions, hooks: SetupHooks) -> Result<()> {
        tracing::debug!(
            path = %self.shared.path.display(),
            credential_len = credential.len(),
            fetch_interval_secs = options.fetch_interval.as_secs(),
            "File provider setup"
        );
        for (name, url) in options.endpoints.iter() {
            tracing::debug!("Ignoring {} endpoint {} for file provider", name, url);
        }

        *self.shared.hooks.lock() = Some(hooks);
        self.shared.notify(ConfigurationFetched::embedded());

        match self.shared.load() {
            Ok(Some(has_changes)) => {
                self.shared.notify(ConfigurationFetched::network(has_changes));
            }
            Ok(None) => {
                tracing::warn!(
                    path = %self.shared.path.display(),
                    "Flag file not found, serving defaults until it appears"
                );
            }
            Err(e) => return Err(FlagsyncError::provider(e.to_string())),
        }

        if self.watch {
            self.start_watching()
                .map_err(|e| FlagsyncError::provider(e.to_string()))?;
        }

        Ok(())
    }

    async fn fetch(&self) -> Result<()> {
        self.shared.reload();
        Ok(())
    }

    fn get_boolean(&self, name: &str, default: bool) -> Result<bool> {
        self.shared
            .store
            .lookup(name, FlagValue::Bool(default))
            .map(|v| v.as_bool().unwrap_or(default))
    }

    fn get_string(&self, name: &str, default: &str) -> Result<String> {
        self.shared
            .store
            .lookup(name, FlagValue::from(default))
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| default.to_string()))
    }

    fn get_number(&self, name: &str, default: f64) -> Result<f64> {
        self.shared
            .store
            .lookup(name, FlagValue::Number(default))
            .map(|v| v.as_number().unwrap_or(default))
    }

    fn unfreeze(&self, name: &str) -> Result<()> {
        self.shared.store.unfreeze(name)
    }

    fn unfreeze_all(&self) {
        self.shared.store.unfreeze_all();
    }

    fn unfreeze_level(&self, level: FreezeLevel) {
        let released = self.shared.store.unfreeze_level(level);
        tracing::debug!(?level, released, "Released frozen flags");
    }
}
