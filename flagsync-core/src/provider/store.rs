//! Value store shared by the bundled providers
//!
//! Applied configuration lives behind an `ArcSwap` so evaluation never
//! blocks on a configuration swap. Frozen flags capture their value on
//! first evaluation and keep it until released.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};

use flagsync_utils::{FlagsyncError, Result};

use super::expect_kind;
use crate::flags::{qualified_name, FlagDefinition, FlagValue, FreezeLevel};
use crate::targeting::CustomPropertyValue;

pub struct FlagStore {
    /// Latest applied configuration, by qualified name
    values: ArcSwap<HashMap<String, FlagValue>>,
    /// Registered definitions, by qualified name
    registered: RwLock<HashMap<String, FlagDefinition>>,
    /// Values captured by frozen flags
    frozen: Mutex<HashMap<String, FlagValue>>,
    properties: RwLock<BTreeMap<String, CustomPropertyValue>>,
}

impl Default for FlagStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FlagStore {
    pub fn new() -> Self {
        Self {
            values: ArcSwap::from_pointee(HashMap::new()),
            registered: RwLock::new(HashMap::new()),
            frozen: Mutex::new(HashMap::new()),
            properties: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn register(&self, namespace: &str, definitions: &[FlagDefinition]) {
        let mut registered = self.registered.write();
        for def in definitions {
            registered.insert(qualified_name(namespace, &def.name), def.clone());
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registered.read().contains_key(name)
    }

    pub fn set_property(&self, name: &str, value: CustomPropertyValue) {
        self.properties.write().insert(name.to_string(), value);
    }

    pub fn properties(&self) -> BTreeMap<String, CustomPropertyValue> {
        self.properties.read().clone()
    }

    /// Swap in a new configuration; returns whether any value changed
    pub fn apply(&self, values: HashMap<String, FlagValue>) -> bool {
        let next = Arc::new(values);
        let previous = self.values.swap(Arc::clone(&next));
        *previous != *next
    }

    pub fn values(&self) -> Arc<HashMap<String, FlagValue>> {
        self.values.load_full()
    }

    /// Resolve a flag, falling back to `default` when unconfigured
    pub fn lookup(&self, name: &str, default: FlagValue) -> Result<FlagValue> {
        let kind = default.kind();
        let value = match self.values.load().get(name) {
            Some(v) => expect_kind(name, v.clone(), kind)?,
            None => default,
        };

        let frozen = self
            .registered
            .read()
            .get(name)
            .map(|d| d.freeze.is_frozen())
            .unwrap_or(false);

        if frozen {
            let mut captured = self.frozen.lock();
            let held = captured.entry(name.to_string()).or_insert(value);
            Ok(held.clone())
        } else {
            Ok(value)
        }
    }

    pub fn unfreeze(&self, name: &str) -> Result<()> {
        if !self.is_registered(name) {
            return Err(FlagsyncError::UnknownFlag(name.to_string()));
        }
        self.frozen.lock().remove(name);
        Ok(())
    }

    pub fn unfreeze_all(&self) {
        self.frozen.lock().clear();
    }

    /// Release captures held by flags declared with `level`
    pub fn unfreeze_level(&self, level: FreezeLevel) -> usize {
        let registered = self.registered.read();
        let mut frozen = self.frozen.lock();
        let before = frozen.len();
        frozen.retain(|name, _| registered.get(name).map(|d| d.freeze) != Some(level));
        before - frozen.len()
    }
}

/// Flatten a TOML flag table into qualified names
///
/// Nested tables become namespaces: `[default] fontSize = 16` and
/// `"default.fontSize" = 16` both yield `default.fontSize`.
pub fn flatten_flag_table(table: &toml::Table) -> Result<HashMap<String, FlagValue>> {
    let mut out = HashMap::new();
    flatten_into(table, "", &mut out)?;
    Ok(out)
}

fn flatten_into(
    table: &toml::Table,
    prefix: &str,
    out: &mut HashMap<String, FlagValue>,
) -> Result<()> {
    for (key, value) in table {
        let name = qualified_name(prefix, key);
        match value {
            toml::Value::Table(inner) => flatten_into(inner, &name, out)?,
            other => {
                let flag_value = FlagValue::from_toml(other).ok_or_else(|| FlagsyncError::InvalidFlag {
                    flag: name.clone(),
                    message: format!("unsupported value type {}", other.type_str()),
                })?;
                out.insert(name, flag_value);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_freeze() -> FlagStore {
        let store = FlagStore::new();
        store.register(
            "",
            &[
                FlagDefinition::flag("autoUpdateFlag", false),
                FlagDefinition::flag("frozenFlag", false).with_freeze(FreezeLevel::UntilLaunch),
            ],
        );
        store
    }

    #[test]
    fn test_lookup_falls_back_to_default() {
        let store = FlagStore::new();
        assert_eq!(
            store.lookup("language", FlagValue::from("en")).unwrap(),
            FlagValue::from("en")
        );
    }

    #[test]
    fn test_lookup_rejects_wrong_kind() {
        let store = FlagStore::new();
        store.apply(HashMap::from([("fontSize".into(), FlagValue::from("big"))]));
        let result = store.lookup("fontSize", FlagValue::from(16));
        assert!(matches!(result, Err(FlagsyncError::TypeMismatch { .. })));
    }

    #[test]
    fn test_apply_reports_changes() {
        let store = FlagStore::new();
        let values = HashMap::from([("a".to_string(), FlagValue::Bool(true))]);
        assert!(store.apply(values.clone()));
        assert!(!store.apply(values));
    }

    #[test]
    fn test_frozen_flag_holds_first_value() {
        let store = store_with_freeze();
        assert_eq!(store.lookup("frozenFlag", FlagValue::Bool(false)).unwrap(), FlagValue::Bool(false));

        store.apply(HashMap::from([
            ("frozenFlag".to_string(), FlagValue::Bool(true)),
            ("autoUpdateFlag".to_string(), FlagValue::Bool(true)),
        ]));

        assert_eq!(store.lookup("autoUpdateFlag", FlagValue::Bool(false)).unwrap(), FlagValue::Bool(true));
        assert_eq!(store.lookup("frozenFlag", FlagValue::Bool(false)).unwrap(), FlagValue::Bool(false));

        store.unfreeze("frozenFlag").unwrap();
        assert_eq!(store.lookup("frozenFlag", FlagValue::Bool(false)).unwrap(), FlagValue::Bool(true));
    }

    #[test]
    fn test_unfreeze_unknown_flag() {
        let store = store_with_freeze();
        assert!(matches!(store.unfreeze("nope"), Err(FlagsyncError::UnknownFlag(_))));
    }

    #[test]
    fn test_unfreeze_all_releases_every_capture() {
        let store = store_with_freeze();
        store.lookup("frozenFlag", FlagValue::Bool(false)).unwrap();
        store.apply(HashMap::from([("frozenFlag".to_string(), FlagValue::Bool(true))]));
        store.unfreeze_all();
        assert_eq!(store.lookup("frozenFlag", FlagValue::Bool(false)).unwrap(), FlagValue::Bool(true));
    }

    #[test]
    fn test_unfreeze_level_only_releases_that_level() {
        let store = store_with_freeze();
        store.register(
            "",
            &[FlagDefinition::flag("sessionFlag", false).with_freeze(FreezeLevel::UntilForeground)],
        );
        store.lookup("frozenFlag", FlagValue::Bool(false)).unwrap();
        store.lookup("sessionFlag", FlagValue::Bool(false)).unwrap();
        store.apply(HashMap::from([
            ("frozenFlag".to_string(), FlagValue::Bool(true)),
            ("sessionFlag".to_string(), FlagValue::Bool(true)),
        ]));

        assert_eq!(store.unfreeze_level(FreezeLevel::UntilForeground), 1);
        assert_eq!(store.lookup("sessionFlag", FlagValue::Bool(false)).unwrap(), FlagValue::Bool(true));
        assert_eq!(store.lookup("frozenFlag", FlagValue::Bool(false)).unwrap(), FlagValue::Bool(false));
    }

    #[test]
    fn test_properties_recorded() {
        let store = FlagStore::new();
        store.set_property("userTier", CustomPropertyValue::String("pro".into()));
        store.set_property("betaTester", CustomPropertyValue::Bool(true));
        let props = store.properties();
        assert_eq!(props.len(), 2);
        assert_eq!(props["betaTester"], CustomPropertyValue::Bool(true));
    }

    #[test]
    fn test_flatten_nested_and_dotted() {
        let table: toml::Table = r#"
            "routes.home" = false

            [default]
            fontSize = 16
            fontColor = "Red"
        "#
        .parse()
        .unwrap();

        let flat = flatten_flag_table(&table).unwrap();
        assert_eq!(flat["routes.home"], FlagValue::Bool(false));
        assert_eq!(flat["default.fontSize"], FlagValue::Number(16.0));
        assert_eq!(flat["default.fontColor"], FlagValue::from("Red"));
    }

    #[test]
    fn test_flatten_rejects_arrays() {
        let table: toml::Table = "sizes = [1, 2]".parse().unwrap();
        assert!(flatten_flag_table(&table).is_err());
    }
}
