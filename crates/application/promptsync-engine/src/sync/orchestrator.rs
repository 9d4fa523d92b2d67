use std::sync::Arc;

use promptsync_core::{
    Collections, Credentials, MergeMode, SyncDirection, SyncDocument, SyncId, SyncStatus,
    WebDavSettings,
};
use promptsync_infra::WebDavClient;
use promptsync_persistence::KeyValueStore;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::sync::guard::{InFlightRegistry, InFlightTicket};
use crate::sync::retry::with_retry;
use crate::sync::{
    LocalData, NotificationKind, NotificationStore, RemoteDocumentStore, StatusPoller,
    SyncError, SyncEvent, SyncOptions, SyncReport, SyncStateStore, WebDavRemote,
};

#[derive(Debug, Clone, Copy)]
enum Operation {
    Push,
    Pull(MergeMode),
}

impl Operation {
    fn direction(self) -> SyncDirection {
        match self {
            Operation::Push => SyncDirection::Push,
            Operation::Pull(_) => SyncDirection::Pull,
        }
    }
}

/// An accepted operation: guard held, `in_progress` recorded.
struct Prepared {
    op: Operation,
    creds: Credentials,
    status: SyncStatus,
    token: CancellationToken,
    _ticket: InFlightTicket,
}

/// Drives push and pull operations end to end.
///
/// Cloning is cheap; clones share the guard, the stores and the poller.
#[derive(Clone)]
pub struct SyncOrchestrator {
    remote: Arc<dyn RemoteDocumentStore>,
    local: LocalData,
    state: SyncStateStore,
    notifications: NotificationStore,
    poller: Arc<StatusPoller>,
    guard: Arc<InFlightRegistry>,
    options: SyncOptions,
    events: Option<mpsc::UnboundedSender<SyncEvent>>,
    root: CancellationToken,
}

/// A sync running on a background task.
pub struct SyncHandle {
    id: SyncId,
    direction: SyncDirection,
    token: CancellationToken,
    join: JoinHandle<Result<SyncReport, SyncError>>,
}

impl SyncHandle {
    pub fn id(&self) -> &SyncId {
        &self.id
    }

    pub fn direction(&self) -> SyncDirection {
        self.direction
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub async fn wait(self) -> Result<SyncReport, SyncError> {
        match self.join.await {
            Ok(res) => res,
            Err(e) => Err(SyncError::Aborted(e.to_string())),
        }
    }
}

impl SyncOrchestrator {
    pub fn new(
        remote: Arc<dyn RemoteDocumentStore>,
        store: Arc<dyn KeyValueStore>,
        options: SyncOptions,
    ) -> Self {
        let state = SyncStateStore::new(Arc::clone(&store));
        let poller = StatusPoller::new(state.clone(), options.poll_interval)
            .with_timeout(options.watch_timeout);
        Self {
            remote,
            local: LocalData::new(Arc::clone(&store)),
            notifications: NotificationStore::new(store, options.notification_ttl),
            state,
            poller: Arc::new(poller),
            guard: Arc::new(InFlightRegistry::new(options.guard_scope)),
            options,
            events: None,
            root: CancellationToken::new(),
        }
    }

    /// Orchestrator talking WebDAV through `client`.
    pub fn with_webdav(
        client: reqwest::Client,
        store: Arc<dyn KeyValueStore>,
        options: SyncOptions,
    ) -> Self {
        let remote = WebDavRemote::new(WebDavClient::new(client));
        Self::new(Arc::new(remote), store, options)
    }

    /// Deliver [`SyncEvent`]s to `tx`. Sending never blocks an operation.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<SyncEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn local(&self) -> &LocalData {
        &self.local
    }

    pub fn state(&self) -> &SyncStateStore {
        &self.state
    }

    pub fn notifications(&self) -> &NotificationStore {
        &self.notifications
    }

    pub fn poller(&self) -> &Arc<StatusPoller> {
        &self.poller
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn current_sync_id(&self, direction: SyncDirection) -> Option<SyncId> {
        self.guard.current(direction)
    }

    pub fn settings(&self) -> Result<WebDavSettings, SyncError> {
        Ok(self.local.load_settings()?)
    }

    /// Stored credentials, or `ConfigurationMissing` naming the empty fields.
    pub fn credentials(&self) -> Result<Credentials, SyncError> {
        Ok(self.settings()?.credentials()?)
    }

    pub async fn test_connection(&self, creds: &Credentials) -> Result<(), SyncError> {
        tokio::select! {
            _ = self.root.cancelled() => Err(SyncError::Cancelled),
            res = self.remote.test_connection(creds) => res,
        }
    }

    /// Persist `settings` once the server accepts their credentials.
    pub async fn save_settings(&self, settings: &WebDavSettings) -> Result<(), SyncError> {
        let creds = settings.credentials()?;
        self.test_connection(&creds).await?;
        self.local.save_settings(settings)?;
        info!("saved WebDAV settings for {}", creds.base_url());
        Ok(())
    }

    pub async fn push(&self) -> Result<SyncReport, SyncError> {
        let prepared = self.prepare(Operation::Push)?;
        self.execute(prepared).await
    }

    pub async fn pull(&self, mode: MergeMode) -> Result<SyncReport, SyncError> {
        let prepared = self.prepare(Operation::Pull(mode))?;
        self.execute(prepared).await
    }

    /// Accept a push and run it in the background.
    ///
    /// Configuration, guard and missing-runtime errors are returned here,
    /// before anything is written. The returned handle yields the
    /// operation's result.
    pub fn start_push(&self) -> Result<SyncHandle, SyncError> {
        self.start(Operation::Push)
    }

    pub fn start_pull(&self, mode: MergeMode) -> Result<SyncHandle, SyncError> {
        self.start(Operation::Pull(mode))
    }

    /// Cancel the in-flight operation of `direction`. Returns whether there
    /// was one.
    pub fn cancel(&self, direction: SyncDirection) -> bool {
        self.guard.cancel(direction)
    }

    /// Cancel every operation and watch started by this orchestrator.
    pub fn shutdown(&self) {
        self.root.cancel();
        self.poller.stop_all();
    }

    fn start(&self, op: Operation) -> Result<SyncHandle, SyncError> {
        let runtime = Handle::try_current().map_err(|_| SyncError::NoRuntime)?;
        let prepared = self.prepare(op)?;
        let id = prepared.status.id.clone();
        let token = prepared.token.clone();
        let direction = op.direction();

        let this = self.clone();
        let join = runtime.spawn(async move { this.execute(prepared).await });

        let events = self.events.clone();
        let watched = id.clone();
        let watch = self.poller.watch(id.clone(), direction, move |outcome| {
            if let Some(tx) = events {
                send_event(
                    &tx,
                    SyncEvent::Settled {
                        id: watched,
                        direction,
                        outcome,
                    },
                );
            }
        });
        if let Err(e) = watch {
            warn!("{direction} {id} runs unwatched: {e}");
        }

        Ok(SyncHandle {
            id,
            direction,
            token,
            join,
        })
    }

    fn prepare(&self, op: Operation) -> Result<Prepared, SyncError> {
        let direction = op.direction();
        let creds = self.credentials()?;

        let id = SyncId::generate();
        let token = self.root.child_token();
        let ticket = self.guard.try_acquire(direction, id.clone(), token.clone())?;
        let status = self.state.begin(direction, id.clone())?;

        info!("{direction} {id} started");
        self.emit(SyncEvent::Started { id, direction });
        Ok(Prepared {
            op,
            creds,
            status,
            token,
            _ticket: ticket,
        })
    }

    async fn execute(&self, prepared: Prepared) -> Result<SyncReport, SyncError> {
        let direction = prepared.op.direction();
        let id = prepared.status.id.clone();

        let outcome = tokio::select! {
            _ = prepared.token.cancelled() => Err(SyncError::Cancelled),
            res = self.run(prepared.op, &prepared.creds, &id) => res,
        };

        let terminal = match &outcome {
            Ok(report) => {
                info!("{direction} {id} succeeded: {}", report.message);
                self.notify(NotificationKind::Success, direction, &report.message);
                self.emit(SyncEvent::Succeeded {
                    id: id.clone(),
                    direction,
                    message: report.message.clone(),
                });
                if matches!(prepared.op, Operation::Pull(_)) {
                    self.schedule_reload(id.clone());
                }
                prepared.status.succeeded(report.message.clone())
            }
            Err(e) => {
                warn!("{direction} {id} failed: {e}");
                self.notify(NotificationKind::Error, direction, &e.to_string());
                self.emit(SyncEvent::Failed {
                    id: id.clone(),
                    direction,
                    error: e.to_string(),
                });
                prepared.status.failed(e.to_string())
            }
        };
        if let Err(e) = self.state.write(direction, &terminal) {
            warn!("failed to record {direction} {id} outcome: {e}");
        }
        // The ticket in `prepared` drops here, after the terminal record.
        outcome
    }

    async fn run(
        &self,
        op: Operation,
        creds: &Credentials,
        id: &SyncId,
    ) -> Result<SyncReport, SyncError> {
        let retries = promptsync_config::clamp_retries(self.options.max_retries);
        let backoff = self.options.retry_backoff;

        match op {
            Operation::Push => {
                let collections = self.local.load_collections()?;
                let (prompts, categories) =
                    (collections.prompts.len(), collections.categories.len());
                let document = SyncDocument::new(collections);

                self.remote.ensure_collection(creds).await;
                let bytes = with_retry("upload", retries, backoff, || {
                    self.remote.upload(creds, &document)
                })
                .await?;

                Ok(SyncReport {
                    id: id.clone(),
                    direction: SyncDirection::Push,
                    mode: None,
                    prompts,
                    categories,
                    added_prompts: 0,
                    added_categories: 0,
                    bytes: Some(bytes),
                    message: format!(
                        "Uploaded {prompts} prompts and {categories} categories to WebDAV"
                    ),
                })
            }
            Operation::Pull(mode) => {
                let document =
                    with_retry("download", retries, backoff, || self.remote.download(creds))
                        .await?;
                let remote = document.into_collections();

                let (merged, added_prompts, added_categories) = match mode {
                    MergeMode::Replace => {
                        let (p, c) = (remote.prompts.len(), remote.categories.len());
                        (remote, p, c)
                    }
                    MergeMode::Append => {
                        let local = self.local.load_collections()?;
                        let (p, c) = (local.prompts.len(), local.categories.len());
                        let merged: Collections = local.merged(remote, MergeMode::Append);
                        let added = (merged.prompts.len() - p, merged.categories.len() - c);
                        (merged, added.0, added.1)
                    }
                };
                self.local.save_collections(&merged)?;

                let message = match mode {
                    MergeMode::Replace => format!(
                        "Downloaded {} prompts and {} categories, local data replaced",
                        merged.prompts.len(),
                        merged.categories.len()
                    ),
                    MergeMode::Append => format!(
                        "Merged {added_prompts} new prompts and {added_categories} new categories from WebDAV"
                    ),
                };
                Ok(SyncReport {
                    id: id.clone(),
                    direction: SyncDirection::Pull,
                    mode: Some(mode),
                    prompts: merged.prompts.len(),
                    categories: merged.categories.len(),
                    added_prompts,
                    added_categories,
                    bytes: None,
                    message,
                })
            }
        }
    }

    fn notify(&self, kind: NotificationKind, direction: SyncDirection, message: &str) {
        if let Err(e) = self.notifications.publish(kind, direction, message) {
            warn!("failed to publish {direction} notification: {e}");
        }
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(tx) = &self.events {
            send_event(tx, event);
        }
    }

    fn schedule_reload(&self, id: SyncId) {
        let Some(tx) = self.events.clone() else {
            return;
        };
        let delay = self.options.reload_delay;
        let root = self.root.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = root.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    send_event(&tx, SyncEvent::ReloadRequested { id });
                }
            }
        });
    }
}

fn send_event(tx: &mpsc::UnboundedSender<SyncEvent>, event: SyncEvent) {
    if let Err(mpsc::error::SendError(event)) = tx.send(event) {
        debug!("event receiver gone, dropped {event:?}");
    }
}
