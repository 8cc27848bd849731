//! Option bags threaded through pipeline invocations
//!
//! Options are passed unchanged to every step of a chain and every branch of
//! a fan-out; only decorators touch them, merging their bound defaults under
//! the call-time entries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// String-keyed configuration values passed alongside a module's input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options {
    values: Map<String, Value>,
}

impl Options {
    /// An empty option bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Insert a value, replacing any existing entry under the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// True when the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Merge `overrides` over this bag; overriding entries win on collision.
    ///
    /// Neither input is mutated.
    pub fn merged(&self, overrides: &Options) -> Options {
        let mut merged = self.values.clone();
        for (key, value) in &overrides.values {
            merged.insert(key.clone(), value.clone());
        }
        Options { values: merged }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no entries are present.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

impl From<Map<String, Value>> for Options {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}
