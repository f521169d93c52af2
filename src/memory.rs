//! Key-value memory backends used by the `Store` tool.
//!
//! The store is an explicit instance owned by the application and handed to
//! the tool at construction, so separate applications (and tests) never share
//! state by accident.

use dashmap::DashMap;
use serde_json::Value;

/// A key-value memory backend.
pub trait Memory: Send + Sync {
    /// Load a value. `None` if the key was never saved.
    fn load(&self, key: &str) -> Option<Value>;

    /// Save a value, replacing any previous one.
    fn save(&self, key: &str, value: Value);
}

/// Concurrent in-memory store using a sharded hashmap. All data is lost on
/// process exit.
#[derive(Debug, Default)]
pub struct InMemory {
    data: DashMap<String, Value>,
}

impl InMemory {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// All keys (snapshot; not a consistent view under concurrent writes).
    pub fn keys(&self) -> Vec<String> {
        self.data.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl Memory for InMemory {
    fn load(&self, key: &str) -> Option<Value> {
        self.data.get(key).map(|v| v.value().clone())
    }

    fn save(&self, key: &str, value: Value) {
        self.data.insert(key.to_string(), value);
    }
}
