use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::StorageError;

pub const PROMPTSYNC_REDB_FILENAME: &str = "promptsync.redb";
pub const CURRENT_SCHEMA: u32 = 1;

/// The two key spaces of the local data store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreScope {
    /// Durable settings (the WebDAV form values).
    Settings,
    /// Collections, status records and notifications.
    Local,
}

impl std::fmt::Display for StoreScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreScope::Settings => f.write_str("settings"),
            StoreScope::Local => f.write_str("local"),
        }
    }
}

/// Key to JSON value map, the unit every store call reads or writes.
pub type Entries = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbState {
    Missing,
    Valid,
    Busy,
    Corrupt,
    NewerSchema { found: u32, supported: u32 },
}

/// Asynchronous-agnostic key-value persistence with two scopes.
///
/// `get` returns only the keys that exist. `set` writes every entry in one
/// transaction. Removing an absent key is not an error.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, scope: StoreScope, keys: &[&str]) -> Result<Entries, StorageError>;

    fn set(&self, scope: StoreScope, entries: Entries) -> Result<(), StorageError>;

    fn remove(&self, scope: StoreScope, keys: &[&str]) -> Result<(), StorageError>;

    /// Every key in `scope` starting with `prefix`, in ascending order.
    fn keys_with_prefix(&self, scope: StoreScope, prefix: &str)
        -> Result<Vec<String>, StorageError>;
}

/// Typed single-key helpers over any [`KeyValueStore`].
pub trait KeyValueStoreExt: KeyValueStore {
    fn get_one<T: DeserializeOwned>(
        &self,
        scope: StoreScope,
        key: &str,
    ) -> Result<Option<T>, StorageError> {
        match self.get(scope, &[key])?.remove(key) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    fn set_one<T: Serialize + ?Sized>(
        &self,
        scope: StoreScope,
        key: &str,
        value: &T,
    ) -> Result<(), StorageError> {
        let mut entries = Entries::new();
        entries.insert(key.to_string(), serde_json::to_value(value)?);
        self.set(scope, entries)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}

pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.trim().is_empty() {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
