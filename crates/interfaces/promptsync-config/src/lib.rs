//! Central configuration constants for runtime limits and defaults.

/// Remote path used when the user has not configured one.
pub const DEFAULT_SYNC_PATH: &str = "/quick-prompt/prompts.json";

/// Interval between two reads of a watched sync status record (ms).
pub const STATUS_POLL_INTERVAL_MS: u64 = 2_000;

/// Delay between a successful pull and the view reload notification (ms).
pub const RELOAD_DELAY_MS: u64 = 1_000;

/// Lifetime of a transient sync notification record (ms).
pub const NOTIFICATION_TTL_MS: u64 = 5_000;

/// Default whole-request HTTP timeout (seconds).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default HTTP connect timeout (seconds).
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default number of retries for transient transport failures. Zero keeps the
/// "fail once, let the user retry" behavior.
pub const DEFAULT_MAX_RETRIES: u32 = 0;

/// Upper bound for configured retries.
pub const MAX_RETRIES: u32 = 5;

/// First backoff step between retries (ms); doubles on every attempt.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

/// Convenience function to clamp a retry count into the allowed range.
pub fn clamp_retries(v: u32) -> u32 {
    v.min(MAX_RETRIES)
}
