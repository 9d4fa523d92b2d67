use std::sync::Arc;

use promptsync_core::{Collections, Record, WebDavSettings};
use promptsync_persistence::{Entries, KeyValueStore, StorageError, StoreScope};
use serde_json::Value;

pub const PROMPTS_KEY: &str = "prompts";
pub const CATEGORIES_KEY: &str = "categories";

pub const SERVER_URL_KEY: &str = "webdavServerUrl";
pub const USERNAME_KEY: &str = "webdavUsername";
pub const PASSWORD_KEY: &str = "webdavPassword";
pub const SYNC_PATH_KEY: &str = "webdavSyncPath";
pub const AUTO_SYNC_KEY: &str = "webdavAutoSync";

const SETTINGS_KEYS: [&str; 5] = [
    SERVER_URL_KEY,
    USERNAME_KEY,
    PASSWORD_KEY,
    SYNC_PATH_KEY,
    AUTO_SYNC_KEY,
];

/// Typed view of the local data store: the two collections and the
/// WebDAV settings.
#[derive(Clone)]
pub struct LocalData {
    store: Arc<dyn KeyValueStore>,
}

impl LocalData {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Both collections; a missing key reads as an empty collection.
    pub fn load_collections(&self) -> Result<Collections, StorageError> {
        let mut entries = self
            .store
            .get(StoreScope::Local, &[PROMPTS_KEY, CATEGORIES_KEY])?;
        Ok(Collections::new(
            take_records(&mut entries, PROMPTS_KEY)?,
            take_records(&mut entries, CATEGORIES_KEY)?,
        ))
    }

    /// Write both collections in one store call.
    pub fn save_collections(&self, collections: &Collections) -> Result<(), StorageError> {
        let mut entries = Entries::new();
        entries.insert(
            PROMPTS_KEY.to_string(),
            Value::Array(collections.prompts.clone()),
        );
        entries.insert(
            CATEGORIES_KEY.to_string(),
            Value::Array(collections.categories.clone()),
        );
        self.store.set(StoreScope::Local, entries)
    }

    pub fn load_settings(&self) -> Result<WebDavSettings, StorageError> {
        let entries = self.store.get(StoreScope::Settings, &SETTINGS_KEYS)?;
        let text = |key: &str| entries.get(key).and_then(Value::as_str).map(str::to_string);

        let mut settings = WebDavSettings {
            server_url: text(SERVER_URL_KEY),
            username: text(USERNAME_KEY),
            password: text(PASSWORD_KEY),
            auto_sync_enabled: entries
                .get(AUTO_SYNC_KEY)
                .and_then(Value::as_bool)
                .unwrap_or(false),
            ..WebDavSettings::default()
        };
        if let Some(path) = text(SYNC_PATH_KEY).filter(|p| !p.trim().is_empty()) {
            settings.sync_path = path;
        }
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &WebDavSettings) -> Result<(), StorageError> {
        let mut entries = Entries::new();
        let mut remove = Vec::new();
        for (key, value) in [
            (SERVER_URL_KEY, &settings.server_url),
            (USERNAME_KEY, &settings.username),
            (PASSWORD_KEY, &settings.password),
        ] {
            match value {
                Some(v) => {
                    entries.insert(key.to_string(), Value::String(v.clone()));
                }
                None => remove.push(key),
            }
        }
        entries.insert(
            SYNC_PATH_KEY.to_string(),
            Value::String(settings.sync_path.clone()),
        );
        entries.insert(
            AUTO_SYNC_KEY.to_string(),
            Value::Bool(settings.auto_sync_enabled),
        );
        self.store.set(StoreScope::Settings, entries)?;
        self.store.remove(StoreScope::Settings, &remove)
    }
}

fn take_records(entries: &mut Entries, key: &str) -> Result<Vec<Record>, StorageError> {
    match entries.remove(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => Ok(serde_json::from_value(value)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptsync_persistence::MemoryKeyValueStore;
    use serde_json::json;

    fn local() -> LocalData {
        LocalData::new(Arc::new(MemoryKeyValueStore::new()))
    }

    #[test]
    fn empty_store_reads_as_empty_collections() {
        assert!(local().load_collections().unwrap().is_empty());
    }

    #[test]
    fn collections_persist_in_order() {
        let local = local();
        let collections = Collections::new(
            vec![json!({"id": "b"}), json!({"id": "a"})],
            vec![json!({"id": "c"})],
        );
        local.save_collections(&collections).unwrap();
        assert_eq!(local.load_collections().unwrap(), collections);
    }

    #[test]
    fn settings_default_when_unset() {
        let settings = local().load_settings().unwrap();
        assert_eq!(settings, WebDavSettings::default());
    }

    #[test]
    fn settings_persist_under_flat_keys() {
        let local = local();
        let settings = WebDavSettings {
            server_url: Some("https://dav.example.com".into()),
            username: Some("alice".into()),
            password: Some("wonderland".into()),
            sync_path: "/backup/prompts.json".into(),
            auto_sync_enabled: true,
        };
        local.save_settings(&settings).unwrap();
        assert_eq!(local.load_settings().unwrap(), settings);

        let raw = local
            .store()
            .get(StoreScope::Settings, &[SERVER_URL_KEY, AUTO_SYNC_KEY])
            .unwrap();
        assert_eq!(raw[SERVER_URL_KEY], json!("https://dav.example.com"));
        assert_eq!(raw[AUTO_SYNC_KEY], json!(true));
    }

    #[test]
    fn clearing_a_field_removes_its_key() {
        let local = local();
        let mut settings = WebDavSettings {
            password: Some("pw".into()),
            ..WebDavSettings::default()
        };
        local.save_settings(&settings).unwrap();
        settings.password = None;
        local.save_settings(&settings).unwrap();
        assert_eq!(local.load_settings().unwrap().password, None);
    }
}
