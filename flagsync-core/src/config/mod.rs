//! Configuration management for flagsync
//!
//! TOML file with sync settings, per-environment credentials and default
//! overrides, and the declared flag catalog.

mod defaults;
mod loader;
mod schema;

pub use defaults::DEFAULT_CONFIG_TOML;
pub use loader::{ConfigLoader, MIN_FETCH_INTERVAL_SECS};
pub use schema::*;

use std::collections::HashMap;

use flagsync_utils::Result;

use crate::flags::FlagCatalog;

impl AppConfig {
    /// Pick the active environment
    ///
    /// An explicit request wins, then `FLAGSYNC_ENV`, then `sync.environment`.
    pub fn environment(&self, requested: Option<Environment>) -> Result<Environment> {
        let from_env = match requested {
            Some(_) => None,
            None => Environment::from_env()?,
        };
        Ok(self.resolve_environment(requested, from_env))
    }

    fn resolve_environment(
        &self,
        requested: Option<Environment>,
        from_env: Option<Environment>,
    ) -> Environment {
        requested
            .or(from_env)
            .or(self.sync.environment)
            .unwrap_or_default()
    }

    pub fn environment_config(&self, env: Environment) -> Option<&EnvironmentConfig> {
        self.environments.get(env.as_str())
    }

    /// Credential for an environment, falling back to `sync.credential`
    ///
    /// Empty when neither is set; the controller reports that as missing.
    pub fn credential(&self, env: Environment) -> String {
        self.environment_config(env)
            .and_then(|e| e.credential.clone())
            .or_else(|| self.sync.credential.clone())
            .unwrap_or_default()
    }

    /// Declared flags with the environment's overrides applied
    pub fn build_catalog(&self, env: Environment) -> Result<FlagCatalog> {
        let mut catalog = FlagCatalog::new();
        for entry in &self.flags {
            catalog.register(&entry.namespace, [entry.definition()])?;
        }

        if let Some(env_config) = self.environment_config(env) {
            let overrides: HashMap<_, _> = env_config
                .overrides
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            catalog.apply_overrides(&overrides)?;
        }

        Ok(catalog)
    }
}
