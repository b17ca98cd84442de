//! JSON manipulation helpers used across the engine.
//!
//! Node configs are kind-specific JSON records; the engine deep-merges a
//! behavior's default config under user-provided config when a node is
//! added, and persistence uses [`JsonSerializable`] for its string
//! round-trips.

use serde_json::{Map, Value};

/// Strategy for resolving leaf conflicts during a deep merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Keep the left operand's value on conflict.
    PreferLeft,
    /// Keep the right operand's value on conflict.
    PreferRight,
}

/// Deep-merge two JSON values.
///
/// Objects merge key-wise recursively; everything else is a leaf resolved
/// by `strategy`. `Null` never wins over a concrete value, so a behavior's
/// default config survives an absent user config.
///
/// # Examples
///
/// ```rust
/// use loomflow::utils::json_ext::{deep_merge, MergeStrategy};
/// use serde_json::json;
///
/// let defaults = json!({"model": "base", "options": {"retries": 2}});
/// let config = json!({"options": {"retries": 5}});
/// let merged = deep_merge(&defaults, &config, MergeStrategy::PreferRight);
///
/// assert_eq!(merged, json!({"model": "base", "options": {"retries": 5}}));
/// ```
#[must_use]
pub fn deep_merge(left: &Value, right: &Value, strategy: MergeStrategy) -> Value {
    match (left, right) {
        (Value::Object(l), Value::Object(r)) => {
            let mut merged: Map<String, Value> = l.clone();
            for (key, rv) in r {
                let entry = match merged.get(key) {
                    Some(lv) => deep_merge(lv, rv, strategy),
                    None => rv.clone(),
                };
                merged.insert(key.clone(), entry);
            }
            Value::Object(merged)
        }
        (Value::Null, other) => other.clone(),
        (other, Value::Null) => other.clone(),
        (l, r) => match strategy {
            MergeStrategy::PreferLeft => l.clone(),
            MergeStrategy::PreferRight => r.clone(),
        },
    }
}

/// Uniform JSON string round-trip for persistence payloads.
pub trait JsonSerializable<E>: Sized {
    fn to_json_string(&self) -> Result<String, E>;
    fn from_json_str(s: &str) -> Result<Self, E>;
}
