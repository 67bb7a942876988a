//! Configuration loader

use std::path::Path;

use flagsync_utils::{config_file, FlagsyncError, Result};
use url::Url;

use super::defaults::DEFAULT_CONFIG_TOML;
use super::{AppConfig, Environment};

/// Shortest fetch interval the provider accepts
pub const MIN_FETCH_INTERVAL_SECS: u64 = 30;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from default location
    ///
    /// Falls back to the embedded defaults when no file exists.
    pub fn load() -> Result<AppConfig> {
        let path = config_file();
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            tracing::debug!("No config at {}, using embedded defaults", path.display());
            Self::embedded()
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<AppConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| FlagsyncError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content, path)
    }

    /// Parse the embedded default configuration
    pub fn embedded() -> Result<AppConfig> {
        Self::parse(DEFAULT_CONFIG_TOML, Path::new("<embedded>"))
    }

    /// Parse configuration from string
    pub fn parse(content: &str, path: &Path) -> Result<AppConfig> {
        toml::from_str(content).map_err(|e| FlagsyncError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Validate configuration
    pub fn validate(config: &AppConfig) -> Result<()> {
        if config.sync.fetch_interval_secs < MIN_FETCH_INTERVAL_SECS {
            return Err(FlagsyncError::config(format!(
                "fetch_interval_secs must be at least {}",
                MIN_FETCH_INTERVAL_SECS
            )));
        }

        for (name, endpoint) in config.sync.endpoints.iter() {
            validate_endpoint(name, endpoint)?;
        }

        let mut environments = vec![config.sync.environment.unwrap_or_default()];
        for name in config.environments.keys() {
            environments.push(name.parse::<Environment>()?);
        }

        // Every environment's overrides must fit the declared flags
        for env in environments {
            config.build_catalog(env)?;
        }

        Ok(())
    }

    /// Load and validate
    pub fn load_and_validate() -> Result<AppConfig> {
        let config = Self::load()?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Load and validate from a specific path
    pub fn load_and_validate_from(path: &Path) -> Result<AppConfig> {
        let config = Self::load_from_path(path)?;
        Self::validate(&config)?;
        Ok(config)
    }
}

/// Endpoints must be absolute http(s) URLs with a host
fn validate_endpoint(name: &str, endpoint: &str) -> Result<()> {
    let url = Url::parse(endpoint).map_err(|e| {
        FlagsyncError::config(format!("Invalid {} endpoint '{}': {}", name, endpoint, e))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(FlagsyncError::config(format!(
            "{} endpoint must be an http(s) URL, got '{}'",
            name, endpoint
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(FlagsyncError::config(format!(
            "Missing host in {} endpoint '{}'",
            name, endpoint
        )));
    }
    Ok(())
}
