use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::sync::SyncError;

/// Run `op`, repeating it up to `max_retries` more times while it fails with
/// a transient error. The pause doubles after every failed attempt.
pub(crate) async fn with_retry<T, F, Fut>(
    what: &str,
    max_retries: u32,
    backoff: Duration,
    mut op: F,
) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
{
    let mut attempt = 0;
    let mut delay = backoff;
    loop {
        match op().await {
            Err(e) if e.is_transient() && attempt < max_retries => {
                attempt += 1;
                warn!("{what} failed ({e}), retry {attempt}/{max_retries} in {delay:?}");
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
            other => return other,
        }
    }
}
