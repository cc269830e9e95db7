//! Periodic garbage collection of the revocation registry.
//!
//! A revoked credential only needs remembering until it would have expired
//! on its own; this job deletes entries past that point.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::auth::revocation::RevocationRegistry;

/// Run the revocation cleanup loop until `cancel` is triggered.
pub async fn run(registry: Arc<RevocationRegistry>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        "Revocation cleanup job started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Revocation cleanup job stopping");
                break;
            }
            _ = ticker.tick() => {
                match registry.cleanup_expired().await {
                    Ok(deleted) => {
                        if deleted > 0 {
                            tracing::info!(deleted, "Revocation cleanup: purged expired tokens");
                        } else {
                            tracing::debug!("Revocation cleanup: nothing to purge");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Revocation cleanup failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use socialchat_db::models::revoked_token::CreateRevokedToken;

    use super::*;
    use crate::lookup::memory::InMemoryStore;
    use crate::lookup::RevocationStore;

    #[tokio::test]
    async fn first_tick_purges_and_cancel_stops_the_loop() {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert(&CreateRevokedToken {
                token_id: "stale".into(),
                user_id: 1,
                expires_at: Utc::now() - chrono::Duration::minutes(5),
                revoked_at: Utc::now() - chrono::Duration::minutes(10),
            })
            .await
            .unwrap();
        let registry = Arc::new(RevocationRegistry::new(
            store.clone(),
            Duration::from_secs(1),
        ));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(registry, Duration::from_secs(3600), cancel.clone()));

        // The interval's first tick fires immediately.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.revoked_count(), 0);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("job should stop on cancel")
            .unwrap();
    }
}
