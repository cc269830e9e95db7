use std::sync::Arc;
use std::time::Duration;

use socialchat_core::destination::PRESENCE_QUEUE;
use socialchat_core::events::PresenceEvent;
use socialchat_core::types::DbId;

use crate::lookup::{with_timeout, SocialGraph};
use crate::ws::WsManager;

/// Delivers presence transitions to the private queue of online friends.
pub struct PresenceBroadcaster {
    social: Arc<dyn SocialGraph>,
    ws_manager: Arc<WsManager>,
    lookup_timeout: Duration,
}

impl PresenceBroadcaster {
    pub fn new(
        social: Arc<dyn SocialGraph>,
        ws_manager: Arc<WsManager>,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            social,
            ws_manager,
            lookup_timeout,
        }
    }

    /// Notify every friend of `event.user_id` for whom `is_present` holds.
    ///
    /// Returns the number of friends notified. A failed friend lookup is
    /// logged and delivers nothing. Offline friends are skipped, not queued.
    pub async fn broadcast<F>(&self, event: &PresenceEvent, is_present: F) -> usize
    where
        F: Fn(DbId) -> bool,
    {
        let friends = match with_timeout(
            self.lookup_timeout,
            self.social.friend_ids_of(event.user_id),
        )
        .await
        {
            Ok(friends) => friends,
            Err(e) => {
                tracing::error!(
                    user_id = event.user_id,
                    error = %e,
                    "Friend lookup failed; presence not broadcast"
                );
                return 0;
            }
        };

        let body = match serde_json::to_string(event) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize presence event");
                return 0;
            }
        };

        let mut notified = 0;
        for friend_id in friends.into_iter().filter(|id| is_present(*id)) {
            self.ws_manager
                .send_to_user(friend_id, PRESENCE_QUEUE, &body)
                .await;
            notified += 1;
        }

        tracing::debug!(
            user_id = event.user_id,
            online = event.online,
            notified,
            "Presence broadcast"
        );
        notified
    }
}
