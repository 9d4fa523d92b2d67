pub mod commands;
pub mod settings;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use camino::Utf8PathBuf;
use clap::ValueEnum;
use directories::ProjectDirs;
use promptsync_core::{MergeMode, SyncDirection};
use promptsync_engine::{SyncOptions, SyncOrchestrator};
use promptsync_infra::{build_http_client, HttpOptions};
use promptsync_persistence::{RedbKeyValueStore, PROMPTSYNC_REDB_FILENAME};

#[derive(ValueEnum, Clone, Debug, Copy, PartialEq, Eq)]
pub enum CliMergeMode {
    /// Overwrite local collections with the remote document
    Replace,
    /// Keep local entries, add remote entries with unseen ids
    Append,
}

impl From<CliMergeMode> for MergeMode {
    fn from(m: CliMergeMode) -> Self {
        match m {
            CliMergeMode::Replace => MergeMode::Replace,
            CliMergeMode::Append => MergeMode::Append,
        }
    }
}

#[derive(ValueEnum, Clone, Debug, Copy, PartialEq, Eq)]
pub enum CliDirection {
    Push,
    Pull,
}

impl From<CliDirection> for SyncDirection {
    fn from(d: CliDirection) -> Self {
        match d {
            CliDirection::Push => SyncDirection::Push,
            CliDirection::Pull => SyncDirection::Pull,
        }
    }
}

/// Everything a command needs to reach the local store and the server.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub db_path: Utf8PathBuf,
    pub http: HttpOptions,
    pub options: SyncOptions,
}

impl CliContext {
    pub fn new(db_path: Utf8PathBuf) -> Self {
        Self {
            db_path,
            http: HttpOptions::default(),
            options: SyncOptions::default(),
        }
    }

    pub fn with_timeout(mut self, secs: Option<u64>) -> Self {
        self.http = match secs {
            Some(0) => HttpOptions::unbounded(),
            Some(s) => self.http.with_request_timeout(Duration::from_secs(s)),
            None => self.http,
        };
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.options.max_retries = promptsync_config::clamp_retries(retries);
        self
    }

    pub fn open_store(&self) -> Result<Arc<RedbKeyValueStore>> {
        let store = RedbKeyValueStore::open_or_recover(&self.db_path)
            .with_context(|| format!("Failed to open local store at {}", self.db_path))?;
        Ok(Arc::new(store))
    }

    pub fn orchestrator(&self) -> Result<SyncOrchestrator> {
        let store = self.open_store()?;
        let client = build_http_client(&self.http).context("Failed to build HTTP client")?;
        Ok(SyncOrchestrator::with_webdav(
            client,
            store,
            self.options.clone(),
        ))
    }
}

/// `<data dir>/promptsync.redb` for the current user.
pub fn default_db_path() -> Result<Utf8PathBuf> {
    let dirs = ProjectDirs::from("com", "promptsync", "promptsync")
        .ok_or_else(|| anyhow!("Could not determine a data directory; pass --db"))?;
    let path = dirs.data_dir().join(PROMPTSYNC_REDB_FILENAME);
    Utf8PathBuf::from_path_buf(path).map_err(|p| anyhow!("Non UTF-8 data path: {}", p.display()))
}
