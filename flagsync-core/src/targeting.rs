//! Targeting user context
//!
//! The user the flags are evaluated for. Its attributes are pushed to the
//! provider as custom properties before setup so remote targeting rules
//! can match on them, and a subset is attached to every impression.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use flagsync_utils::{user_context_file, FlagsyncError, Result};

/// Value of a targeting property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomPropertyValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl From<&str> for CustomPropertyValue {
    fn from(s: &str) -> Self {
        CustomPropertyValue::String(s.to_string())
    }
}

impl From<String> for CustomPropertyValue {
    fn from(s: String) -> Self {
        CustomPropertyValue::String(s)
    }
}

impl From<bool> for CustomPropertyValue {
    fn from(b: bool) -> Self {
        CustomPropertyValue::Bool(b)
    }
}

impl From<f64> for CustomPropertyValue {
    fn from(n: f64) -> Self {
        CustomPropertyValue::Number(n)
    }
}

impl From<u32> for CustomPropertyValue {
    fn from(n: u32) -> Self {
        CustomPropertyValue::Number(f64::from(n))
    }
}

impl From<&CustomPropertyValue> for serde_json::Value {
    fn from(value: &CustomPropertyValue) -> Self {
        match value {
            CustomPropertyValue::Bool(b) => serde_json::Value::Bool(*b),
            CustomPropertyValue::Number(n) => serde_json::json!(n),
            CustomPropertyValue::String(s) => serde_json::Value::String(s.clone()),
        }
    }
}

/// Account plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserTier {
    #[default]
    Free,
    Pro,
    Enterprise,
}

impl UserTier {
    pub const ALL: [UserTier; 3] = [UserTier::Free, UserTier::Pro, UserTier::Enterprise];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserTier::Free => "free",
            UserTier::Pro => "pro",
            UserTier::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for UserTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const SAMPLE_COUNTRIES: [&str; 7] = ["US", "UK", "CA", "DE", "FR", "JP", "AU"];

/// Attributes of the current user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    pub user_id: String,
    pub email: String,
    #[serde(rename = "userTier")]
    pub tier: UserTier,
    /// Days since account creation
    #[serde(rename = "accountAge")]
    pub account_age_days: u32,
    pub country: String,
    pub beta_tester: bool,
    pub feature_usage_count: u32,
}

impl UserContext {
    /// Random demonstration user
    pub fn generate_sample() -> Self {
        let id = Uuid::new_v4().simple().to_string();
        Self {
            user_id: format!("user-{}", &id[..9]),
            email: format!("user{}@example.com", fastrand::u32(..1000)),
            tier: UserTier::ALL[fastrand::usize(..UserTier::ALL.len())],
            account_age_days: fastrand::u32(..365),
            country: SAMPLE_COUNTRIES[fastrand::usize(..SAMPLE_COUNTRIES.len())].to_string(),
            // roughly 30% are beta testers
            beta_tester: fastrand::f64() > 0.7,
            feature_usage_count: fastrand::u32(..100),
        }
    }

    /// Properties pushed to the provider for targeting
    pub fn custom_properties(&self) -> Vec<(String, CustomPropertyValue)> {
        vec![
            ("userId".into(), self.user_id.as_str().into()),
            ("email".into(), self.email.as_str().into()),
            ("userTier".into(), self.tier.as_str().into()),
            ("accountAge".into(), self.account_age_days.into()),
            ("country".into(), self.country.as_str().into()),
            ("betaTester".into(), self.beta_tester.into()),
            ("featureUsageCount".into(), self.feature_usage_count.into()),
        ]
    }

    /// Subset attached to impressions
    pub fn impression_context(&self) -> BTreeMap<String, serde_json::Value> {
        BTreeMap::from([
            ("userTier".to_string(), serde_json::Value::from(self.tier.as_str())),
            ("country".to_string(), serde_json::Value::from(self.country.as_str())),
            ("betaTester".to_string(), serde_json::Value::from(self.beta_tester)),
        ])
    }
}

/// JSON persistence for the user context
#[derive(Debug, Clone)]
pub struct UserContextStore {
    path: PathBuf,
}

impl Default for UserContextStore {
    fn default() -> Self {
        Self::new(user_context_file())
    }
}

impl UserContextStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored user, if any
    pub fn load(&self) -> Result<Option<UserContext>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| FlagsyncError::FileRead {
            path: self.path.clone(),
            source: e,
        })?;
        let user = serde_json::from_str(&content)
            .map_err(|e| FlagsyncError::Serialization(format!("{}: {}", self.path.display(), e)))?;
        Ok(Some(user))
    }

    /// Load the stored user, generating and saving a sample when none exists
    ///
    /// An unparseable file is replaced rather than failing the caller.
    pub fn load_or_generate(&self) -> Result<UserContext> {
        match self.load() {
            Ok(Some(user)) => return Ok(user),
            Ok(None) => {}
            Err(FlagsyncError::Serialization(msg)) => {
                tracing::warn!("Discarding unreadable user context: {}", msg);
            }
            Err(e) => return Err(e),
        }

        let user = UserContext::generate_sample();
        tracing::info!(user_id = %user.user_id, "Generated sample user context");
        self.save(&user)?;
        Ok(user)
    }

    pub fn save(&self, user: &UserContext) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            flagsync_utils::ensure_dir(parent).map_err(|e| FlagsyncError::FileWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(user)
            .map_err(|e| FlagsyncError::Serialization(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| FlagsyncError::FileWrite {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Modify the stored user in place and persist the result
    pub fn update<F>(&self, f: F) -> Result<UserContext>
    where
        F: FnOnce(&mut UserContext),
    {
        let mut user = self.load_or_generate()?;
        f(&mut user);
        self.save(&user)?;
        Ok(user)
    }

    /// Forget the stored user; the next load generates a new one
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FlagsyncError::FileWrite {
                path: self.path.clone(),
                source: e,
            }),
        }
    }
}
