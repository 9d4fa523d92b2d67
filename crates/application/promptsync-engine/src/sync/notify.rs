use std::sync::Arc;
use std::time::Duration;

use promptsync_core::{now_millis, SyncDirection};
use promptsync_persistence::{KeyValueStore, KeyValueStoreExt, StorageError, StoreScope};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

pub const NOTIFICATION_PREFIX: &str = "sync_notification_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

/// A short-lived, toast-style record of a sync outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: NotificationKind,
    pub direction: SyncDirection,
    pub message: String,
    pub created_at: i64,
}

#[derive(Clone)]
pub struct NotificationStore {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl NotificationStore {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn ttl_millis(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }

    /// Store a notification and schedule its removal after the TTL.
    ///
    /// Outside a tokio runtime nothing is scheduled; [`purge_expired`]
    /// cleans up instead.
    ///
    /// [`purge_expired`]: Self::purge_expired
    pub fn publish(
        &self,
        kind: NotificationKind,
        direction: SyncDirection,
        message: impl Into<String>,
    ) -> Result<String, StorageError> {
        let created_at = now_millis();
        let suffix = Uuid::new_v4().simple().to_string();
        let key = format!("{NOTIFICATION_PREFIX}{created_at}_{}", &suffix[..8]);
        let notification = Notification {
            kind,
            direction,
            message: message.into(),
            created_at,
        };
        self.store.set_one(StoreScope::Local, &key, &notification)?;

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let store = Arc::clone(&self.store);
            let ttl = self.ttl;
            let expired = key.clone();
            handle.spawn(async move {
                tokio::time::sleep(ttl).await;
                if let Err(e) = store.remove(StoreScope::Local, &[expired.as_str()]) {
                    warn!("failed to expire notification {expired}: {e}");
                }
            });
        }
        Ok(key)
    }

    /// Notifications younger than the TTL, oldest first.
    pub fn list(&self) -> Result<Vec<(String, Notification)>, StorageError> {
        let cutoff = now_millis() - self.ttl_millis();
        let mut out = Vec::new();
        for key in self
            .store
            .keys_with_prefix(StoreScope::Local, NOTIFICATION_PREFIX)?
        {
            match self.store.get_one::<Notification>(StoreScope::Local, &key) {
                Ok(Some(n)) if n.created_at > cutoff => out.push((key, n)),
                Ok(_) => {}
                Err(e) => warn!("skipping unreadable notification {key}: {e}"),
            }
        }
        out.sort_by_key(|(_, n)| n.created_at);
        Ok(out)
    }

    /// Remove records past their TTL, including unreadable ones. Returns how
    /// many were removed.
    pub fn purge_expired(&self) -> Result<usize, StorageError> {
        let cutoff = now_millis() - self.ttl_millis();
        let mut stale = Vec::new();
        for key in self
            .store
            .keys_with_prefix(StoreScope::Local, NOTIFICATION_PREFIX)?
        {
            match self.store.get_one::<Notification>(StoreScope::Local, &key) {
                Ok(Some(n)) if n.created_at > cutoff => {}
                _ => stale.push(key),
            }
        }
        let refs: Vec<&str> = stale.iter().map(String::as_str).collect();
        self.store.remove(StoreScope::Local, &refs)?;
        Ok(stale.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptsync_persistence::MemoryKeyValueStore;

    #[tokio::test]
    async fn published_notification_expires_after_ttl() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let notes = NotificationStore::new(store.clone(), Duration::from_millis(50));

        let key = notes
            .publish(NotificationKind::Success, SyncDirection::Push, "uploaded")
            .unwrap();
        assert!(key.starts_with(NOTIFICATION_PREFIX));
        assert_eq!(notes.list().unwrap().len(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(store
            .keys_with_prefix(StoreScope::Local, NOTIFICATION_PREFIX)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn keys_are_unique_within_a_millisecond() {
        let notes = NotificationStore::new(
            Arc::new(MemoryKeyValueStore::new()),
            Duration::from_secs(5),
        );
        let a = notes
            .publish(NotificationKind::Error, SyncDirection::Pull, "x")
            .unwrap();
        let b = notes
            .publish(NotificationKind::Error, SyncDirection::Pull, "x")
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(notes.list().unwrap().len(), 2);
    }

    #[test]
    fn purge_removes_stale_and_unreadable_records() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let notes = NotificationStore::new(store.clone(), Duration::from_secs(5));

        let old = Notification {
            kind: NotificationKind::Success,
            direction: SyncDirection::Push,
            message: "old".into(),
            created_at: now_millis() - 60_000,
        };
        store
            .set_one(StoreScope::Local, "sync_notification_1_old", &old)
            .unwrap();
        store
            .set_one(StoreScope::Local, "sync_notification_2_bad", &"garbage")
            .unwrap();
        notes
            .publish(NotificationKind::Success, SyncDirection::Push, "fresh")
            .unwrap();

        assert_eq!(notes.list().unwrap().len(), 1);
        assert_eq!(notes.purge_expired().unwrap(), 2);
        let left = notes.list().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].1.message, "fresh");
    }
}
