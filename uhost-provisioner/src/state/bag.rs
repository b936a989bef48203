//! Thread-safe key-value bag shared between build steps.

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;

/// A thread-safe bag for values published by build steps.
#[derive(Debug, Default)]
pub struct ContextBag {
    data: RwLock<HashMap<String, serde_json::Value>>,
}

impl ContextBag {
    /// Creates a new empty context bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a value from the bag.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.data.read().get(key).cloned()
    }

    /// Gets a value and decodes it.
    ///
    /// Returns `None` when the key is absent; `Some(Err)` when it holds
    /// something of another shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<Result<T, serde_json::Error>> {
        self.get(key).map(serde_json::from_value)
    }

    /// Gets a non-empty string value.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.data.read().get(key) {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    /// Stores a value, replacing any previous one.
    pub fn put(&self, key: impl Into<String>, value: serde_json::Value) {
        self.data.write().insert(key.into(), value);
    }

    /// Encodes and stores a value.
    pub fn put_as<T: Serialize>(&self, key: impl Into<String>, value: &T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.put(key, value);
        Ok(())
    }

    /// Removes a value.
    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.data.write().remove(key)
    }

    /// Returns all keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }
}
