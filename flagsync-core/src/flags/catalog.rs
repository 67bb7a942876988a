//! Registry of declared flags, grouped by namespace

use std::collections::{BTreeMap, BTreeSet, HashMap};

use flagsync_utils::{FlagsyncError, Result};

use super::{FlagDefinition, FlagKind, FlagValue};
use crate::snapshot::FlagSnapshot;

/// Build the identifier a flag is addressed by
///
/// The empty namespace leaves the bare name.
pub fn qualified_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", namespace, name)
    }
}

/// Sibling names resolve within the child's namespace
fn resolve_parent(namespace: &str, parent: &str) -> String {
    if parent.contains('.') {
        parent.to_string()
    } else {
        qualified_name(namespace, parent)
    }
}

/// A registered flag
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub namespace: String,
    pub definition: FlagDefinition,
    /// Qualified name of the gating flag
    pub parent: Option<String>,
}

impl CatalogEntry {
    pub fn qualified_name(&self) -> String {
        qualified_name(&self.namespace, &self.definition.name)
    }
}

/// All statically declared flags known to the application
#[derive(Debug, Clone, Default)]
pub struct FlagCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl FlagCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a group of flags under a namespace
    ///
    /// Either every definition is accepted or none is.
    pub fn register<I>(&mut self, namespace: &str, definitions: I) -> Result<()>
    where
        I: IntoIterator<Item = FlagDefinition>,
    {
        let mut staged: BTreeMap<String, CatalogEntry> = BTreeMap::new();
        for definition in definitions {
            definition.validate()?;
            let key = qualified_name(namespace, &definition.name);
            if self.entries.contains_key(&key) || staged.contains_key(&key) {
                return Err(FlagsyncError::DuplicateFlag(key));
            }

            let parent = match &definition.parent {
                Some(parent) => {
                    let parent = resolve_parent(namespace, parent);
                    let gate = self
                        .entries
                        .get(&parent)
                        .or_else(|| staged.get(&parent))
                        .map(|e| e.definition.kind());
                    if gate != Some(FlagKind::Boolean) {
                        return Err(FlagsyncError::InvalidFlag {
                            flag: key,
                            message: format!(
                                "parent '{}' must be a boolean flag registered before it",
                                parent
                            ),
                        });
                    }
                    Some(parent)
                }
                None => None,
            };

            staged.insert(
                key,
                CatalogEntry {
                    namespace: namespace.to_string(),
                    definition,
                    parent,
                },
            );
        }

        tracing::debug!(namespace, count = staged.len(), "Registered flags");
        self.entries.extend(staged);
        Ok(())
    }

    pub fn get(&self, qualified: &str) -> Option<&CatalogEntry> {
        self.entries.get(qualified)
    }

    pub fn contains(&self, qualified: &str) -> bool {
        self.entries.contains_key(qualified)
    }

    /// Entries ordered by qualified name
    pub fn iter(&self) -> impl Iterator<Item = (&String, &CatalogEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn namespaces(&self) -> Vec<&str> {
        self.entries
            .values()
            .map(|e| e.namespace.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Definitions belonging to one namespace
    pub fn namespace_definitions(&self, namespace: &str) -> Vec<FlagDefinition> {
        self.entries
            .values()
            .filter(|e| e.namespace == namespace)
            .map(|e| e.definition.clone())
            .collect()
    }

    pub fn by_kind(&self, kind: FlagKind) -> Vec<&CatalogEntry> {
        self.entries
            .values()
            .filter(|e| e.definition.kind() == kind)
            .collect()
    }

    /// Child to parent links, by qualified name
    pub fn parents(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .filter_map(|(key, e)| e.parent.clone().map(|p| (key.clone(), p)))
            .collect()
    }

    /// Snapshot holding every declared default
    pub fn defaults(&self) -> FlagSnapshot {
        FlagSnapshot::from_iter(
            self.entries
                .iter()
                .map(|(key, entry)| (key.clone(), entry.definition.default.clone())),
        )
    }

    /// Replace declared defaults, e.g. with per-environment values
    pub fn apply_overrides(&mut self, overrides: &HashMap<String, FlagValue>) -> Result<()> {
        for (key, value) in overrides {
            let entry = self
                .entries
                .get(key)
                .ok_or_else(|| FlagsyncError::UnknownFlag(key.clone()))?;
            if entry.definition.kind() != value.kind() {
                return Err(FlagsyncError::TypeMismatch {
                    flag: key.clone(),
                    expected: entry.definition.kind().to_string(),
                    actual: value.kind().to_string(),
                });
            }
        }

        for (key, value) in overrides {
            if let Some(entry) = self.entries.get_mut(key) {
                entry.definition.default = value.clone();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_catalog() -> FlagCatalog {
        let mut catalog = FlagCatalog::new();
        catalog
            .register(
                "default",
                [
                    FlagDefinition::flag("showMessage", false),
                    FlagDefinition::string(
                        "message",
                        "This is the default message; try changing some flag values!",
                        Vec::<String>::new(),
                    ),
                    FlagDefinition::string("fontColor", "White", ["Red", "Green", "Blue", "Black"]),
                    FlagDefinition::number("fontSize", 24.0, [12.0, 16.0, 24.0]),
                ],
            )
            .unwrap();
        catalog
            .register("routes", [FlagDefinition::flag("home", true)])
            .unwrap();
        catalog
    }

    #[test]
    fn test_qualified_name() {
        assert_eq!(qualified_name("routes", "home"), "routes.home");
        assert_eq!(qualified_name("", "enableDarkMode"), "enableDarkMode");
    }

    #[test]
    fn test_register_and_lookup() {
        let catalog = message_catalog();
        assert_eq!(catalog.len(), 5);
        assert!(catalog.contains("default.fontSize"));
        assert_eq!(catalog.get("routes.home").unwrap().namespace, "routes");
        assert_eq!(catalog.namespaces(), vec!["default", "routes"]);
    }

    #[test]
    fn test_duplicate_rejected_atomically() {
        let mut catalog = message_catalog();
        let result = catalog.register(
            "routes",
            [FlagDefinition::flag("about", true), FlagDefinition::flag("home", false)],
        );
        assert!(matches!(result, Err(FlagsyncError::DuplicateFlag(ref k)) if k == "routes.home"));
        assert!(!catalog.contains("routes.about"));
    }

    #[test]
    fn test_defaults_snapshot() {
        let defaults = message_catalog().defaults();
        assert_eq!(defaults.get("default.fontSize"), Some(&FlagValue::Number(24.0)));
        assert!(defaults.is_enabled("routes.home"));
        assert!(!defaults.is_enabled("default.showMessage"));
    }

    #[test]
    fn test_apply_overrides() {
        let mut catalog = message_catalog();
        let overrides = HashMap::from([("default.fontSize".to_string(), FlagValue::Number(16.0))]);
        catalog.apply_overrides(&overrides).unwrap();
        assert_eq!(
            catalog.get("default.fontSize").unwrap().definition.default,
            FlagValue::Number(16.0)
        );
    }

    #[test]
    fn test_apply_overrides_rejects_kind_mismatch() {
        let mut catalog = message_catalog();
        let overrides = HashMap::from([("routes.home".to_string(), FlagValue::from("yes"))]);
        let result = catalog.apply_overrides(&overrides);
        assert!(matches!(result, Err(FlagsyncError::TypeMismatch { .. })));
        assert!(catalog.get("routes.home").unwrap().definition.default == FlagValue::Bool(true));
    }

    #[test]
    fn test_apply_overrides_rejects_unknown() {
        let mut catalog = message_catalog();
        let overrides = HashMap::from([("features.nope".to_string(), FlagValue::Bool(true))]);
        assert!(matches!(
            catalog.apply_overrides(&overrides),
            Err(FlagsyncError::UnknownFlag(_))
        ));
    }

    #[test]
    fn test_register_nested_flags() {
        let mut catalog = FlagCatalog::new();
        catalog
            .register(
                "notifications",
                [
                    FlagDefinition::flag("enableNotifications", true),
                    FlagDefinition::flag("pushNotifications", false).with_parent("enableNotifications"),
                ],
            )
            .unwrap();
        catalog
            .register(
                "digest",
                [FlagDefinition::flag("weekly", true).with_parent("notifications.pushNotifications")],
            )
            .unwrap();

        let parents = catalog.parents();
        assert_eq!(parents.len(), 2);
        assert_eq!(
            parents["notifications.pushNotifications"],
            "notifications.enableNotifications"
        );
        assert_eq!(parents["digest.weekly"], "notifications.pushNotifications");
    }

    #[test]
    fn test_parent_must_exist_and_be_boolean() {
        let mut catalog = message_catalog();
        let missing = catalog.register(
            "notifications",
            [FlagDefinition::flag("pushNotifications", false).with_parent("enableNotifications")],
        );
        assert!(matches!(missing, Err(FlagsyncError::InvalidFlag { .. })));

        let not_boolean = catalog.register(
            "default",
            [FlagDefinition::flag("boldText", false).with_parent("fontSize")],
        );
        assert!(matches!(not_boolean, Err(FlagsyncError::InvalidFlag { .. })));
        assert!(!catalog.contains("default.boldText"));
    }

    #[test]
    fn test_by_kind_and_namespace_definitions() {
        let catalog = message_catalog();
        assert_eq!(catalog.by_kind(FlagKind::Boolean).len(), 2);
        assert_eq!(catalog.by_kind(FlagKind::Number).len(), 1);
        assert_eq!(catalog.namespace_definitions("default").len(), 4);
        assert!(catalog.namespace_definitions("missing").is_empty());
    }
}
