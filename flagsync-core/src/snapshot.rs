//! Immutable flag snapshots
//!
//! A snapshot is produced fresh on every configuration application and
//! never mutated afterwards. Cloning is cheap: the map is shared.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::flags::FlagValue;

/// Mapping from qualified flag name to its currently-known value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlagSnapshot {
    values: Arc<BTreeMap<String, FlagValue>>,
}

impl FlagSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&FlagValue> {
        self.values.get(name)
    }

    /// True only for a boolean flag currently set to true
    pub fn is_enabled(&self, name: &str) -> bool {
        self.get(name).and_then(FlagValue::as_bool).unwrap_or(false)
    }

    pub fn get_string(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FlagValue::as_str)
    }

    pub fn get_number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(FlagValue::as_number)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FlagValue)> {
        self.values.iter()
    }

    /// Names whose value differs between the two snapshots
    pub fn changed_keys(&self, other: &FlagSnapshot) -> Vec<String> {
        let mut changed: Vec<String> = self
            .values
            .iter()
            .filter(|(k, v)| other.values.get(*k) != Some(*v))
            .map(|(k, _)| k.clone())
            .collect();
        changed.extend(
            other
                .values
                .keys()
                .filter(|k| !self.values.contains_key(*k))
                .cloned(),
        );
        changed.sort();
        changed
    }
}

impl FromIterator<(String, FlagValue)> for FlagSnapshot {
    fn from_iter<T: IntoIterator<Item = (String, FlagValue)>>(iter: T) -> Self {
        Self {
            values: Arc::new(iter.into_iter().collect()),
        }
    }
}

impl Serialize for FlagSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.values.iter())
    }
}
