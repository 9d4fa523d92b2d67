use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::now_millis;

/// Which way data flows in one sync operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    /// Local to remote (upload).
    Push,
    /// Remote to local (download).
    Pull,
}

impl SyncDirection {
    pub const ALL: [SyncDirection; 2] = [SyncDirection::Push, SyncDirection::Pull];

    /// Local-state key under which this direction's status record lives.
    pub fn status_key(self) -> &'static str {
        match self {
            SyncDirection::Push => "webdav_push_status",
            SyncDirection::Pull => "webdav_pull_status",
        }
    }
}

impl std::fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncDirection::Push => f.write_str("push"),
            SyncDirection::Pull => f.write_str("pull"),
        }
    }
}

/// Identifier of one sync operation: creation time in milliseconds plus a
/// short random suffix so two operations in the same millisecond differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncId(String);

impl SyncId {
    pub fn generate() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("{}-{}", now_millis(), &suffix[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SyncId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SyncId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for SyncId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    InProgress,
    Success,
    Error,
}

impl SyncState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SyncState::Success | SyncState::Error)
    }
}

/// Lifecycle record of one sync operation, persisted under
/// [`SyncDirection::status_key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub id: SyncId,
    pub status: SyncState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncStatus {
    pub fn in_progress(id: SyncId) -> Self {
        Self {
            id,
            status: SyncState::InProgress,
            start_time: Some(now_millis()),
            completed_time: None,
            message: None,
            error: None,
        }
    }

    pub fn succeeded(self, message: impl Into<String>) -> Self {
        Self {
            status: SyncState::Success,
            completed_time: Some(now_millis()),
            message: Some(message.into()),
            error: None,
            ..self
        }
    }

    pub fn failed(self, error: impl Into<String>) -> Self {
        Self {
            status: SyncState::Error,
            completed_time: Some(now_millis()),
            message: None,
            error: Some(error.into()),
            ..self
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
