//! Flag impressions
//!
//! An impression records that a flag value was read for a user. Handlers
//! receive one per accessor call on a [`FlagReader`](crate::FlagReader).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::flags::FlagValue;
use crate::targeting::UserContext;

/// A single flag evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Impression {
    pub flag: String,
    pub value: FlagValue,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, serde_json::Value>,
}

impl Impression {
    pub fn new(flag: impl Into<String>, value: FlagValue) -> Self {
        Self {
            flag: flag.into(),
            value,
            timestamp: Utc::now(),
            user_id: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach the user the value was read for
    pub fn for_user(mut self, user: &UserContext) -> Self {
        self.user_id = Some(user.user_id.clone());
        self.context = user.impression_context();
        self
    }
}

/// Receives impressions
pub trait ImpressionHandler: Send + Sync {
    fn on_impression(&self, impression: &Impression);
}

impl<F> ImpressionHandler for F
where
    F: Fn(&Impression) + Send + Sync,
{
    fn on_impression(&self, impression: &Impression) {
        self(impression)
    }
}

/// Share of impressions for one value of a flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantResult {
    pub variant: String,
    pub impressions: usize,
    /// Percent of the flag's impressions, one decimal place
    pub percentage: String,
}

/// In-memory impression log with simple A/B aggregation
#[derive(Debug, Default)]
pub struct ImpressionTracker {
    records: Mutex<Vec<Impression>>,
}

impl ImpressionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, impression: Impression) {
        tracing::debug!(flag = %impression.flag, value = %impression.value, "Flag impression");
        self.records.lock().push(impression);
    }

    pub fn impressions(&self) -> Vec<Impression> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }

    pub fn count_for(&self, flag: &str) -> usize {
        self.records.lock().iter().filter(|i| i.flag == flag).count()
    }

    /// Impression counts per value, in order of first appearance
    pub fn by_value(&self, flag: &str) -> Vec<(String, usize)> {
        let mut grouped: Vec<(String, usize)> = Vec::new();
        for impression in self.records.lock().iter().filter(|i| i.flag == flag) {
            let value = impression.value.to_string();
            match grouped.iter_mut().find(|(v, _)| *v == value) {
                Some((_, count)) => *count += 1,
                None => grouped.push((value, 1)),
            }
        }
        grouped
    }

    pub fn ab_results(&self, flag: &str) -> Vec<VariantResult> {
        let grouped = self.by_value(flag);
        let total: usize = grouped.iter().map(|(_, c)| c).sum();

        grouped
            .into_iter()
            .map(|(variant, impressions)| VariantResult {
                variant,
                impressions,
                percentage: if total > 0 {
                    format!("{:.1}", impressions as f64 * 100.0 / total as f64)
                } else {
                    "0".to_string()
                },
            })
            .collect()
    }
}

impl ImpressionHandler for ImpressionTracker {
    fn on_impression(&self, impression: &Impression) {
        self.track(impression.clone());
    }
}
