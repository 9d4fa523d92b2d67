use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition};

use crate::api::{
    validate_key, DbState, Entries, KeyValueStore, StoreScope, CURRENT_SCHEMA,
    PROMPTSYNC_REDB_FILENAME,
};
use crate::codec::{decode_value, encode_value};
use crate::maintenance::quarantine_corrupt_file;
use crate::StorageError;

const META: TableDefinition<&str, &str> = TableDefinition::new("meta");
const SETTINGS: TableDefinition<&str, &[u8]> = TableDefinition::new("settings");
const LOCAL: TableDefinition<&str, &[u8]> = TableDefinition::new("local");

const META_FORMAT: &str = "format";
const FORMAT_TAG: &str = "promptsync-redb";
const META_SCHEMA: &str = "schema_version";
const META_CREATED_AT: &str = "created_at";
const META_LAST_WRITE_AT: &str = "last_write_at";

fn table_for(scope: StoreScope) -> TableDefinition<'static, &'static str, &'static [u8]> {
    match scope {
        StoreScope::Settings => SETTINGS,
        StoreScope::Local => LOCAL,
    }
}

/// Whether opening failed because the file is not a readable redb database.
fn looks_corrupt(err: &redb::DatabaseError) -> bool {
    match err {
        redb::DatabaseError::Storage(redb::StorageError::Corrupted(_)) => true,
        redb::DatabaseError::Storage(redb::StorageError::Io(io)) => matches!(
            io.kind(),
            std::io::ErrorKind::InvalidData | std::io::ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}

fn quarantine(path: &Utf8Path) {
    if let Err(e) = quarantine_corrupt_file(path) {
        tracing::warn!("could not move corrupt store {} aside: {}", path, e);
    }
}

/// Open databases by path. redb refuses a second handle on the same file
/// within one process, so every opener shares the first one.
struct HandleCache;

impl HandleCache {
    fn map() -> Result<MutexGuard<'static, HashMap<Utf8PathBuf, Arc<Database>>>, StorageError> {
        static HANDLES: OnceLock<Mutex<HashMap<Utf8PathBuf, Arc<Database>>>> = OnceLock::new();
        HANDLES
            .get_or_init(Mutex::default)
            .lock()
            .map_err(|_| StorageError::Poisoned)
    }

    /// The cached handle for `path`, dropping it if the file was deleted.
    fn live(
        map: &mut HashMap<Utf8PathBuf, Arc<Database>>,
        path: &Utf8Path,
    ) -> Option<Arc<Database>> {
        if path.exists() {
            return map.get(path).cloned();
        }
        map.remove(path);
        None
    }
}

/// [`KeyValueStore`] backed by a single redb file.
///
/// Handles are shared per path inside the process, so opening the same file
/// twice returns the same database instead of `DatabaseAlreadyOpen`.
#[derive(Clone)]
pub struct RedbKeyValueStore {
    path: Utf8PathBuf,
    db: Arc<Database>,
}

impl std::fmt::Debug for RedbKeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbKeyValueStore")
            .field("path", &self.path)
            .finish()
    }
}

impl RedbKeyValueStore {
    pub fn path_for_dir(dir: &Utf8Path) -> Utf8PathBuf {
        dir.join(PROMPTSYNC_REDB_FILENAME)
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Open `path`, creating the file and its parent directories when missing.
    ///
    /// A corrupt file is quarantined and reported as [`StorageError::Corrupt`].
    pub fn open(path: &Utf8Path) -> Result<Self, StorageError> {
        match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => std::fs::create_dir_all(parent)?,
            _ => {}
        }

        let mut handles = HandleCache::map()?;
        if let Some(db) = HandleCache::live(&mut handles, path) {
            return Ok(Self {
                path: path.to_path_buf(),
                db,
            });
        }

        let db = if path.exists() {
            Database::open(path.as_std_path()).map_err(|e| {
                if looks_corrupt(&e) {
                    quarantine(path);
                    StorageError::Corrupt
                } else {
                    e.into()
                }
            })?
        } else {
            Database::create(path.as_std_path())?
        };

        if let Err(e) = Self::ensure_schema(&db) {
            drop(db);
            if matches!(e, StorageError::Corrupt) {
                quarantine(path);
            }
            return Err(e);
        }

        let db = Arc::new(db);
        handles.insert(path.to_path_buf(), Arc::clone(&db));
        tracing::debug!("opened local store {}", path);
        Ok(Self {
            path: path.to_path_buf(),
            db,
        })
    }

    /// Like [`open`](Self::open), but a corrupt file is moved aside and a
    /// fresh, empty store takes its place.
    pub fn open_or_recover(path: &Utf8Path) -> Result<Self, StorageError> {
        match Self::open(path) {
            Err(StorageError::Corrupt) => {
                tracing::warn!("recreating local store at {} after corruption", path);
                Self::open(path)
            }
            other => other,
        }
    }

    /// Inspect `path` without creating it. A corrupt file is quarantined.
    pub fn validate(path: &Utf8Path) -> Result<DbState, StorageError> {
        if !path.exists() {
            return Ok(DbState::Missing);
        }
        {
            let mut handles = HandleCache::map()?;
            if HandleCache::live(&mut handles, path).is_some() {
                return Ok(DbState::Valid);
            }
        }

        let checked = match Database::open(path.as_std_path()) {
            Ok(db) => Self::ensure_schema(&db),
            Err(e) if looks_corrupt(&e) => Err(StorageError::Corrupt),
            Err(e) => Err(e.into()),
        };
        match checked {
            Ok(()) => Ok(DbState::Valid),
            Err(StorageError::DatabaseAlreadyOpen) => Ok(DbState::Busy),
            Err(StorageError::NewerSchema { found, supported }) => {
                Ok(DbState::NewerSchema { found, supported })
            }
            Err(StorageError::Corrupt) => {
                quarantine(path);
                Ok(DbState::Corrupt)
            }
            Err(e) => Err(e),
        }
    }

    /// Stamp a fresh database, or check the stamp of an existing one.
    fn ensure_schema(db: &Database) -> Result<(), StorageError> {
        let tx = db.begin_write()?;
        let found = {
            let mut meta = tx.open_table(META)?;
            let format = meta.get(META_FORMAT)?.map(|g| g.value().to_string());
            match format.as_deref() {
                None => {
                    let created_at = Utc::now().to_rfc3339();
                    meta.insert(META_FORMAT, FORMAT_TAG)?;
                    meta.insert(META_SCHEMA, CURRENT_SCHEMA.to_string().as_str())?;
                    meta.insert(META_CREATED_AT, created_at.as_str())?;
                    CURRENT_SCHEMA
                }
                Some(FORMAT_TAG) => meta
                    .get(META_SCHEMA)?
                    .and_then(|g| g.value().parse::<u32>().ok())
                    .unwrap_or(0),
                Some(_) => return Err(StorageError::Corrupt),
            }
        };

        match found {
            CURRENT_SCHEMA => {
                tx.open_table(SETTINGS)?;
                tx.open_table(LOCAL)?;
                tx.commit()?;
                Ok(())
            }
            v if v > CURRENT_SCHEMA => Err(StorageError::NewerSchema {
                found: v,
                supported: CURRENT_SCHEMA,
            }),
            _ => Err(StorageError::Corrupt),
        }
    }
}

impl KeyValueStore for RedbKeyValueStore {
    fn get(&self, scope: StoreScope, keys: &[&str]) -> Result<Entries, StorageError> {
        let read_tx = self.db.begin_read()?;
        let table = read_tx.open_table(table_for(scope))?;
        let mut out = Entries::new();
        for key in keys {
            if let Some(guard) = table.get(*key)? {
                out.insert((*key).to_string(), decode_value(guard.value())?);
            }
        }
        Ok(out)
    }

    fn set(&self, scope: StoreScope, entries: Entries) -> Result<(), StorageError> {
        if entries.is_empty() {
            return Ok(());
        }
        for key in entries.keys() {
            validate_key(key)?;
        }
        let write_tx = self.db.begin_write()?;
        {
            let mut table = write_tx.open_table(table_for(scope))?;
            for (key, value) in &entries {
                let bytes = encode_value(value)?;
                table.insert(key.as_str(), bytes.as_slice())?;
            }
            let ts = Utc::now().to_rfc3339();
            let mut meta = write_tx.open_table(META)?;
            meta.insert(META_LAST_WRITE_AT, ts.as_str())?;
        }
        write_tx.commit()?;
        Ok(())
    }

    fn remove(&self, scope: StoreScope, keys: &[&str]) -> Result<(), StorageError> {
        if keys.is_empty() {
            return Ok(());
        }
        let write_tx = self.db.begin_write()?;
        {
            let mut table = write_tx.open_table(table_for(scope))?;
            for key in keys {
                let _ = table.remove(*key)?;
            }
        }
        write_tx.commit()?;
        Ok(())
    }

    fn keys_with_prefix(
        &self,
        scope: StoreScope,
        prefix: &str,
    ) -> Result<Vec<String>, StorageError> {
        let read_tx = self.db.begin_read()?;
        let table = read_tx.open_table(table_for(scope))?;
        let mut out = Vec::new();
        for row in table.range(prefix..)? {
            let (k, _) = row?;
            let key = k.value();
            if !key.starts_with(prefix) {
                break;
            }
            out.push(key.to_string());
        }
        Ok(out)
    }
}
