use std::sync::Arc;

use promptsync_core::{SyncDirection, SyncId, SyncStatus};
use promptsync_persistence::{KeyValueStore, KeyValueStoreExt, StorageError, StoreScope};

/// Per-direction sync status records in the local scope.
///
/// Each direction has exactly one record; a new operation overwrites the
/// previous one.
#[derive(Clone)]
pub struct SyncStateStore {
    store: Arc<dyn KeyValueStore>,
}

impl SyncStateStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn read(&self, direction: SyncDirection) -> Result<Option<SyncStatus>, StorageError> {
        self.store
            .get_one(StoreScope::Local, direction.status_key())
    }

    pub fn write(&self, direction: SyncDirection, status: &SyncStatus) -> Result<(), StorageError> {
        self.store
            .set_one(StoreScope::Local, direction.status_key(), status)
    }

    /// Record the start of operation `id`.
    pub fn begin(&self, direction: SyncDirection, id: SyncId) -> Result<SyncStatus, StorageError> {
        let status = SyncStatus::in_progress(id);
        self.write(direction, &status)?;
        Ok(status)
    }

    /// Drop the record, e.g. an `in_progress` left behind by a killed process.
    pub fn clear(&self, direction: SyncDirection) -> Result<(), StorageError> {
        self.store
            .remove(StoreScope::Local, &[direction.status_key()])
    }
}
