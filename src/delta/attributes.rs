//! Formatting attributes carried by insert and retain operations.
//!
//! An attribute set maps a key (`bold`, `header`, `link`, ...) to a scalar value. A
//! [`AttributeValue::Null`] value is the removal sentinel: retaining a span with
//! `{"bold": null}` clears bold from it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A scalar attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// `false` for `null` and `false`, which both mean "not applied".
    pub fn is_truthy(&self) -> bool {
        !matches!(self, AttributeValue::Null | AttributeValue::Bool(false))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            AttributeValue::Number(n) => n.as_u64(),
            AttributeValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<u64> for AttributeValue {
    fn from(value: u64) -> Self {
        AttributeValue::Number(value.into())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Number(value.into())
    }
}

/// Ordered attribute set. Empty means "no attributes".
pub type AttributeMap = BTreeMap<String, AttributeValue>;

/// Builds an [`AttributeMap`] from key/value pairs.
pub fn attributes<K, V, I>(pairs: I) -> AttributeMap
where
    K: Into<String>,
    V: Into<AttributeValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Applies `b` on top of `a`; keys in `b` win.
///
/// `null` entries of `b` are kept only when `keep_null` is set, which is the case when the
/// result is itself a retain and must still carry the removal.
pub fn compose(a: &AttributeMap, b: &AttributeMap, keep_null: bool) -> AttributeMap {
    let mut composed: AttributeMap = b
        .iter()
        .filter(|(_, value)| keep_null || !value.is_null())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    for (key, value) in a {
        if !b.contains_key(key) {
            composed.insert(key.clone(), value.clone());
        }
    }
    composed
}

/// The attribute changes that turn `a` into `b`. Keys dropped by `b` map to `null`.
pub fn diff(a: &AttributeMap, b: &AttributeMap) -> AttributeMap {
    let mut changed = AttributeMap::new();
    for key in a.keys().chain(b.keys()) {
        let (old, new) = (a.get(key), b.get(key));
        if old != new {
            changed.insert(key.clone(), new.cloned().unwrap_or(AttributeValue::Null));
        }
    }
    changed
}

/// The attribute changes that undo `applied` on a span formatted with `base`.
pub fn invert(applied: &AttributeMap, base: &AttributeMap) -> AttributeMap {
    let mut inverted: AttributeMap = base
        .iter()
        .filter(|(key, value)| applied.get(*key).is_some_and(|a| a != *value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    for key in applied.keys() {
        if !base.contains_key(key) {
            inverted.insert(key.clone(), AttributeValue::Null);
        }
    }
    inverted
}

/// Rebases `attrs` over concurrent `against` formatting of the same span.
///
/// With `priority` the rewritten side wins and keeps everything; otherwise it keeps only the
/// keys `against` did not touch.
pub fn transform(attrs: &AttributeMap, against: &AttributeMap, priority: bool) -> AttributeMap {
    if priority {
        return attrs.clone();
    }
    attrs
        .iter()
        .filter(|(key, _)| !against.contains_key(*key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
