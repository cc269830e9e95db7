//! Periodic eviction of expired rate-limit windows.
//!
//! Advisory housekeeping: a stale window is replaced on its next use anyway,
//! this only bounds memory for keys that go quiet.

use std::sync::Arc;
use std::time::Duration;

use socialchat_core::rate_limit::RateLimiter;
use tokio_util::sync::CancellationToken;

/// Run the rate-limit cleanup loop until `cancel` is triggered.
pub async fn run(limiter: Arc<RateLimiter>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        "Rate limit cleanup job started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Rate limit cleanup job stopping");
                break;
            }
            _ = ticker.tick() => {
                let removed = limiter.cleanup_expired_entries();
                tracing::debug!(removed, remaining = limiter.len(), "Rate limit cleanup");
            }
        }
    }
}
