use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use promptsync_core::{SyncDirection, SyncId, SyncStatus};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::sync::{SyncError, SyncStateStore};

/// Why a watch stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchOutcome {
    /// The watched operation reached `success` or `error`.
    Terminal(SyncStatus),
    /// The record now belongs to another operation, or is gone.
    Superseded,
    /// The configured watch timeout elapsed first.
    TimedOut,
    /// Stopped by [`StatusPoller::stop`] or by a newer watch.
    Cancelled,
}

struct ActiveWatch {
    watch_id: u64,
    token: CancellationToken,
}

/// Repeatedly reads a direction's status record until the watched sync id
/// settles. One watch per direction; a new watch replaces the old one.
pub struct StatusPoller {
    state: SyncStateStore,
    interval: Duration,
    timeout: Option<Duration>,
    active: Mutex<HashMap<SyncDirection, ActiveWatch>>,
    next_watch: AtomicU64,
}

pub struct WatchHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl WatchHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait until the watch has stopped and its callback has run.
    pub async fn finished(self) {
        let _ = self.join.await;
    }
}

impl StatusPoller {
    pub fn new(state: SyncStateStore, interval: Duration) -> Self {
        Self {
            state,
            interval,
            timeout: None,
            active: Mutex::new(HashMap::new()),
            next_watch: AtomicU64::new(1),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SyncDirection, ActiveWatch>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start watching `id` under `direction`'s status key and call
    /// `on_settled` once the watch stops, whatever the reason.
    ///
    /// Fails with [`SyncError::NoRuntime`] outside a tokio runtime, leaving
    /// any existing watch in place.
    pub fn watch<F>(
        self: &Arc<Self>,
        id: SyncId,
        direction: SyncDirection,
        on_settled: F,
    ) -> Result<WatchHandle, SyncError>
    where
        F: FnOnce(WatchOutcome) + Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| SyncError::NoRuntime)?;
        let watch_id = self.next_watch.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        {
            let mut active = self.lock();
            if let Some(previous) = active.insert(
                direction,
                ActiveWatch {
                    watch_id,
                    token: token.clone(),
                },
            ) {
                debug!("replacing {direction} status watch");
                previous.token.cancel();
            }
        }

        let this = Arc::clone(self);
        let run_token = token.clone();
        let join = runtime.spawn(async move {
            let outcome = this.run(&id, direction, &run_token).await;
            {
                let mut active = this.lock();
                if active.get(&direction).is_some_and(|w| w.watch_id == watch_id) {
                    active.remove(&direction);
                }
            }
            debug!("{direction} watch for {id} stopped: {outcome:?}");
            on_settled(outcome);
        });
        Ok(WatchHandle { token, join })
    }

    /// Watch in the current task instead of a spawned one.
    pub async fn wait_for(&self, id: &SyncId, direction: SyncDirection) -> WatchOutcome {
        self.run(id, direction, &CancellationToken::new()).await
    }

    pub fn is_watching(&self, direction: SyncDirection) -> bool {
        self.lock().contains_key(&direction)
    }

    pub fn stop(&self, direction: SyncDirection) {
        if let Some(watch) = self.lock().remove(&direction) {
            watch.token.cancel();
        }
    }

    pub fn stop_all(&self) {
        for (_, watch) in self.lock().drain() {
            watch.token.cancel();
        }
    }

    async fn run(
        &self,
        id: &SyncId,
        direction: SyncDirection,
        token: &CancellationToken,
    ) -> WatchOutcome {
        let start = Instant::now();
        let deadline = self.timeout.map(|t| start + t);
        let mut ticker = interval_at(start + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => return WatchOutcome::Cancelled,
                _ = ticker.tick() => {}
            }

            match self.state.read(direction) {
                Ok(Some(status)) if &status.id != id => return WatchOutcome::Superseded,
                Ok(None) => return WatchOutcome::Superseded,
                Ok(Some(status)) if status.is_terminal() => {
                    return WatchOutcome::Terminal(status)
                }
                Ok(Some(_)) => {}
                Err(e) => warn!("reading {direction} status failed: {e}"),
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                return WatchOutcome::TimedOut;
            }
        }
    }
}
