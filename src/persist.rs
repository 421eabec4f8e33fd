//! Key-value persistence behind a trait so the host can plug in whatever
//! storage it has. Writes are fire-and-forget; a host without storage uses
//! [`NullStore`] and everything else keeps working.

use std::collections::HashMap;
use std::sync::RwLock;

/// Minimal string key-value storage. Implementations must tolerate loss:
/// callers never depend on a write having landed.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    fn clear(&self);
}

/// In-memory store, used in tests and as a session-scoped default.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner
            .read()
            .expect("memory store poisoned")
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.inner
            .write()
            .expect("memory store poisoned")
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.inner
            .write()
            .expect("memory store poisoned")
            .remove(key);
    }

    fn clear(&self) {
        self.inner.write().expect("memory store poisoned").clear();
    }
}

/// Discards everything. Stands in when storage is unavailable.
#[derive(Default)]
pub struct NullStore;

impl KeyValueStore for NullStore {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _value: &str) {}

    fn remove(&self, _key: &str) {}

    fn clear(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        store.set("a", "1");
        assert_eq!(store.get("a"), Some("1".into()));
        store.remove("a");
        assert_eq!(store.get("a"), None);
    }

    #[test]
    fn null_store_swallows_writes() {
        let store = NullStore;
        store.set("a", "1");
        assert_eq!(store.get("a"), None);
    }
}
