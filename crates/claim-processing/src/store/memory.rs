use super::{ArtifactStore, check_key};
use crate::error::StoreError;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Keeps artifacts in a process-local map. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl ArtifactStore for InMemoryStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        check_key(key)?;
        self.entries.write().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        check_key(key)?;
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        check_key(key)?;
        Ok(self.entries.read().contains_key(key))
    }

    fn has_prefix(&self, prefix: &str) -> Result<bool, StoreError> {
        check_key(prefix)?;
        let namespace = format!("{prefix}/");
        Ok(self.entries.read().keys().any(|k| k.starts_with(&namespace)))
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        check_key(key)?;
        self.entries.write().remove(key);
        Ok(())
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());

        store.put("run/a.json", b"1").unwrap();
        store.put("run/b.json", b"2").unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.keys(), vec!["run/a.json", "run/b.json"]);
        assert!(store.has_prefix("run").unwrap());
        assert!(!store.has_prefix("ru").unwrap());

        store.delete("run/a.json").unwrap();
        assert!(!store.exists("run/a.json").unwrap());
        assert!(store.get("run/a.json").unwrap_err().is_not_found());
    }
}
