pub mod sync;

// Re-export the engine surface
pub use sync::{
    GuardScope, LocalData, Notification, NotificationKind, NotificationStore,
    RemoteDocumentStore, StatusPoller, SyncError, SyncErrorKind, SyncEvent, SyncHandle,
    SyncOptions, SyncOrchestrator, SyncReport, SyncStateStore, WatchHandle, WatchOutcome,
    WebDavRemote,
};
