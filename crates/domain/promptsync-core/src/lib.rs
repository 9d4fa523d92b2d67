pub mod credentials;
pub mod document;
pub mod merge;
pub mod status;

pub use credentials::{Credentials, MissingSettings, WebDavSettings};
pub use document::{record_key, Collections, DocumentError, Record, SyncDocument};
pub use merge::{merge_by_key, MergeMode};
pub use status::{SyncDirection, SyncId, SyncState, SyncStatus};

/// Milliseconds since the Unix epoch, the unit used by every stored timestamp.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
