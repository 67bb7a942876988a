//! Flag definitions declared ahead of time

use serde::{Deserialize, Serialize};

use flagsync_utils::{FlagsyncError, Result};

use super::{FlagKind, FlagValue};

/// How a flag reacts to newly applied configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreezeLevel {
    /// Value follows every configuration application
    #[default]
    None,
    /// Value holds until the application returns to the foreground
    /// (`ConfigurationSyncController::on_foreground`) or is unfrozen
    UntilForeground,
    /// Value holds until explicitly unfrozen
    UntilLaunch,
}

impl FreezeLevel {
    pub fn is_frozen(&self) -> bool {
        !matches!(self, FreezeLevel::None)
    }
}

/// A statically declared flag with its default value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagDefinition {
    pub name: String,
    pub default: FlagValue,
    /// Variants offered in the management platform
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FlagValue>,
    #[serde(default)]
    pub freeze: FreezeLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Boolean flag gating this one: a sibling name, or a qualified name
    /// for a parent in another namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl FlagDefinition {
    /// Boolean flag
    pub fn flag(name: impl Into<String>, default: bool) -> Self {
        Self::new(name, FlagValue::Bool(default), Vec::new())
    }

    /// String flag with optional variants
    pub fn string<I, S>(name: impl Into<String>, default: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            FlagValue::String(default.into()),
            options.into_iter().map(|o| FlagValue::String(o.into())).collect(),
        )
    }

    /// Number flag with optional variants
    pub fn number<I>(name: impl Into<String>, default: f64, options: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        Self::new(
            name,
            FlagValue::Number(default),
            options.into_iter().map(FlagValue::Number).collect(),
        )
    }

    fn new(name: impl Into<String>, default: FlagValue, options: Vec<FlagValue>) -> Self {
        Self {
            name: name.into(),
            default,
            options,
            freeze: FreezeLevel::None,
            description: None,
            parent: None,
        }
    }

    pub fn with_freeze(mut self, freeze: FreezeLevel) -> Self {
        self.freeze = freeze;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Only effective while `parent` (and its own parents) are enabled
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn kind(&self) -> FlagKind {
        self.default.kind()
    }

    /// Check the definition is internally consistent
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.contains(char::is_whitespace) || self.name.contains('.') {
            return Err(FlagsyncError::InvalidFlag {
                flag: self.name.clone(),
                message: "name must be non-empty without whitespace or '.'".into(),
            });
        }

        if self.kind() == FlagKind::Boolean && !self.options.is_empty() {
            return Err(FlagsyncError::InvalidFlag {
                flag: self.name.clone(),
                message: "boolean flags cannot declare options".into(),
            });
        }

        if self.parent.as_deref().is_some_and(|p| p.is_empty() || p == self.name) {
            return Err(FlagsyncError::InvalidFlag {
                flag: self.name.clone(),
                message: "parent must name another flag".into(),
            });
        }

        if let Some(bad) = self.options.iter().find(|o| o.kind() != self.kind()) {
            return Err(FlagsyncError::InvalidFlag {
                flag: self.name.clone(),
                message: format!("option {} is not a {}", bad, self.kind()),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_defaults_to_no_freeze() {
        let def = FlagDefinition::flag("showMessage", false);
        assert_eq!(def.freeze, FreezeLevel::None);
        assert_eq!(def.kind(), FlagKind::Boolean);
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_string_default_need_not_be_an_option() {
        let def = FlagDefinition::string("fontColor", "White", ["Red", "Green", "Blue", "Black"]);
        assert_eq!(def.options.len(), 4);
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_mixed_option_kinds_rejected() {
        let mut def = FlagDefinition::number("fontSize", 24.0, [12.0, 16.0, 24.0]);
        def.options.push(FlagValue::from("huge"));
        let err = def.validate().unwrap_err();
        assert!(err.to_string().contains("fontSize"));
    }

    #[test]
    fn test_dotted_name_rejected() {
        let def = FlagDefinition::flag("routes.home", true);
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_boolean_options_rejected() {
        let mut def = FlagDefinition::flag("enableExport", true);
        def.options.push(FlagValue::Bool(false));
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_self_parent_rejected() {
        let def = FlagDefinition::flag("enableNotifications", true).with_parent("enableNotifications");
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_parent_deserialize() {
        let def: FlagDefinition = toml::from_str(
            r#"
            name = "pushNotifications"
            default = false
            parent = "enableNotifications"
            "#,
        )
        .unwrap();
        assert_eq!(def.parent.as_deref(), Some("enableNotifications"));
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_freeze_level_deserialize() {
        let def: FlagDefinition = toml::from_str(
            r#"
            name = "frozenFlag"
            default = false
            freeze = "until_launch"
            "#,
        )
        .unwrap();
        assert_eq!(def.freeze, FreezeLevel::UntilLaunch);
        assert!(def.freeze.is_frozen());
    }
}
