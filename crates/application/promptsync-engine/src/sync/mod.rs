use std::time::Duration;

use promptsync_core::{MergeMode, MissingSettings, SyncDirection, SyncId};
use promptsync_infra::WebDavError;
use promptsync_persistence::StorageError;

mod guard;
pub mod notify;
pub mod orchestrator;
pub mod poller;
pub mod remote;
mod retry;
pub mod state;
pub mod storage;

pub use notify::{Notification, NotificationKind, NotificationStore};
pub use orchestrator::{SyncHandle, SyncOrchestrator};
pub use poller::{StatusPoller, WatchHandle, WatchOutcome};
pub use remote::{RemoteDocumentStore, WebDavRemote};
pub use state::SyncStateStore;
pub use storage::LocalData;

/// Which operations exclude each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuardScope {
    /// At most one sync in flight, whatever its direction.
    #[default]
    Shared,
    /// One push and one pull may run at the same time.
    PerDirection,
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub guard_scope: GuardScope,
    /// Delay between two status reads of a watch.
    pub poll_interval: Duration,
    /// Give up watching after this long. `None` watches until terminal.
    pub watch_timeout: Option<Duration>,
    /// Delay between a successful pull and [`SyncEvent::ReloadRequested`].
    pub reload_delay: Duration,
    pub notification_ttl: Duration,
    /// Extra attempts for transient transport failures.
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            guard_scope: GuardScope::default(),
            poll_interval: Duration::from_millis(promptsync_config::STATUS_POLL_INTERVAL_MS),
            watch_timeout: None,
            reload_delay: Duration::from_millis(promptsync_config::RELOAD_DELAY_MS),
            notification_ttl: Duration::from_millis(promptsync_config::NOTIFICATION_TTL_MS),
            max_retries: promptsync_config::DEFAULT_MAX_RETRIES,
            retry_backoff: Duration::from_millis(promptsync_config::DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

/// Outcome of a successful sync operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub id: SyncId,
    pub direction: SyncDirection,
    /// Merge policy of a pull; `None` for pushes.
    pub mode: Option<MergeMode>,
    /// Collection sizes after the operation.
    pub prompts: usize,
    pub categories: usize,
    /// Entries added locally by an append pull.
    pub added_prompts: usize,
    pub added_categories: usize,
    /// Body size of a push.
    pub bytes: Option<usize>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub enum SyncEvent {
    Started {
        id: SyncId,
        direction: SyncDirection,
    },
    Succeeded {
        id: SyncId,
        direction: SyncDirection,
        message: String,
    },
    Failed {
        id: SyncId,
        direction: SyncDirection,
        error: String,
    },
    /// The status watch for `id` stopped.
    Settled {
        id: SyncId,
        direction: SyncDirection,
        outcome: WatchOutcome,
    },
    /// A pull changed local data; views should reload.
    ReloadRequested { id: SyncId },
}

/// High-level error type for sync operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("WebDAV settings are incomplete. Missing: {}", .0.join(", "))]
    ConfigurationMissing(Vec<&'static str>),
    #[error("a {running} sync is already in progress")]
    AlreadyRunning { running: SyncDirection },
    #[error("authentication failed, check username and password")]
    AuthFailed,
    #[error("remote file does not exist")]
    RemoteNotFound,
    #[error("invalid data format: {0}")]
    MalformedRemoteDocument(String),
    #[error("network error: {0}")]
    TransportFailure(String),
    #[error("server error: HTTP {0}")]
    ServerError(u16),
    #[error("sync cancelled")]
    Cancelled,
    #[error("local storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("invalid server url: {0}")]
    InvalidUrl(String),
    #[error("sync task aborted: {0}")]
    Aborted(String),
    #[error("no tokio runtime to run the sync on")]
    NoRuntime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncErrorKind {
    ConfigurationMissing,
    AlreadyRunning,
    AuthFailed,
    RemoteNotFound,
    MalformedRemoteDocument,
    TransportFailure,
    ServerError,
    Cancelled,
    Storage,
    InvalidUrl,
    Aborted,
    NoRuntime,
}

impl SyncError {
    pub fn kind(&self) -> SyncErrorKind {
        match self {
            SyncError::ConfigurationMissing(_) => SyncErrorKind::ConfigurationMissing,
            SyncError::AlreadyRunning { .. } => SyncErrorKind::AlreadyRunning,
            SyncError::AuthFailed => SyncErrorKind::AuthFailed,
            SyncError::RemoteNotFound => SyncErrorKind::RemoteNotFound,
            SyncError::MalformedRemoteDocument(_) => SyncErrorKind::MalformedRemoteDocument,
            SyncError::TransportFailure(_) => SyncErrorKind::TransportFailure,
            SyncError::ServerError(_) => SyncErrorKind::ServerError,
            SyncError::Cancelled => SyncErrorKind::Cancelled,
            SyncError::Storage(_) => SyncErrorKind::Storage,
            SyncError::InvalidUrl(_) => SyncErrorKind::InvalidUrl,
            SyncError::Aborted(_) => SyncErrorKind::Aborted,
            SyncError::NoRuntime => SyncErrorKind::NoRuntime,
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::TransportFailure(_))
    }
}

impl From<WebDavError> for SyncError {
    fn from(value: WebDavError) -> Self {
        match value {
            WebDavError::InvalidUrl { url, reason } => {
                SyncError::InvalidUrl(format!("{url}: {reason}"))
            }
            WebDavError::AuthFailed => SyncError::AuthFailed,
            WebDavError::NotFound => SyncError::RemoteNotFound,
            WebDavError::Status(code) => SyncError::ServerError(code),
            WebDavError::Malformed(msg) => SyncError::MalformedRemoteDocument(msg),
            WebDavError::Unreachable(msg) => SyncError::TransportFailure(msg),
        }
    }
}

impl From<MissingSettings> for SyncError {
    fn from(value: MissingSettings) -> Self {
        SyncError::ConfigurationMissing(value.fields)
    }
}
