use std::collections::HashMap;
use std::sync::Mutex;

use crate::api::{validate_key, Entries, KeyValueStore, StoreScope};
use crate::StorageError;

/// In-process [`KeyValueStore`]. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    scopes: Mutex<HashMap<StoreScope, Entries>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, scope: StoreScope, keys: &[&str]) -> Result<Entries, StorageError> {
        let scopes = self.scopes.lock().map_err(|_| StorageError::Poisoned)?;
        let mut out = Entries::new();
        if let Some(entries) = scopes.get(&scope) {
            for key in keys {
                if let Some(value) = entries.get(*key) {
                    out.insert((*key).to_string(), value.clone());
                }
            }
        }
        Ok(out)
    }

    fn set(&self, scope: StoreScope, entries: Entries) -> Result<(), StorageError> {
        for key in entries.keys() {
            validate_key(key)?;
        }
        let mut scopes = self.scopes.lock().map_err(|_| StorageError::Poisoned)?;
        scopes.entry(scope).or_default().extend(entries);
        Ok(())
    }

    fn remove(&self, scope: StoreScope, keys: &[&str]) -> Result<(), StorageError> {
        let mut scopes = self.scopes.lock().map_err(|_| StorageError::Poisoned)?;
        if let Some(entries) = scopes.get_mut(&scope) {
            for key in keys {
                entries.remove(*key);
            }
        }
        Ok(())
    }

    fn keys_with_prefix(
        &self,
        scope: StoreScope,
        prefix: &str,
    ) -> Result<Vec<String>, StorageError> {
        let scopes = self.scopes.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(scopes
            .get(&scope)
            .map(|entries| {
                entries
                    .keys()
                    .filter(|k| k.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyValueStoreExt;

    #[test]
    fn behaves_like_a_keyed_map() {
        let store = MemoryKeyValueStore::new();
        store.set_one(StoreScope::Local, "b", &2).unwrap();
        store.set_one(StoreScope::Local, "a", &1).unwrap();
        store.set_one(StoreScope::Settings, "a", &9).unwrap();

        assert_eq!(store.get_one::<i32>(StoreScope::Local, "a").unwrap(), Some(1));
        assert_eq!(
            store.keys_with_prefix(StoreScope::Local, "").unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );

        store.remove(StoreScope::Local, &["a"]).unwrap();
        assert_eq!(store.get_one::<i32>(StoreScope::Local, "a").unwrap(), None);
        assert_eq!(store.get_one::<i32>(StoreScope::Settings, "a").unwrap(), Some(9));
    }
}
