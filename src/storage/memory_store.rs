use std::collections::BTreeMap;

use super::{KeyValueStore, KvWrite};
use crate::error::Result;

/// Process-local store, used by tests and for throwaway sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn apply(&mut self, writes: &[KvWrite]) -> Result<()> {
        for write in writes {
            match write {
                KvWrite::Set { key, value } => {
                    self.entries.insert(key.clone(), value.clone());
                }
                KvWrite::Remove { key } => {
                    self.entries.remove(key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_remove() {
        let mut store = MemoryStore::new();
        store
            .apply(&[KvWrite::set("a", "1".to_string()), KvWrite::set("b", "2".to_string())])
            .unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));

        store.apply(&[KvWrite::remove("a")]).unwrap();
        assert!(!store.contains("a"));
        assert_eq!(store.keys(), vec!["b".to_string()]);
    }
}
