//! Storage contract shared by every backend.

use std::sync::Arc;

use super::Result;

/// Flat byte-oriented key-value store.
///
/// Keys are namespaced by convention (`shard:<id>`); values are opaque
/// bytes, usually JSON documents.
pub trait KeyValueStore: Send + Sync {
    /// Load the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// All keys starting with `prefix`, sorted.
    fn keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Remove every key.
    fn clear(&self) -> Result<()>;

    fn exists(&self, key: &str) -> bool {
        matches!(self.get(key), Ok(Some(_)))
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key)
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        (**self).keys(prefix)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}
