use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use socialchat_core::events::PresenceEvent;
use socialchat_core::types::{DbId, Timestamp};

use crate::lookup::{with_timeout, LookupError, SocialGraph};
use crate::presence::broadcaster::PresenceBroadcaster;

/// One entry per connected user identity, not per physical connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRecord {
    pub user_id: DbId,
    pub username: String,
    pub connected_at: Timestamp,
}

/// Concurrent map of online users.
///
/// Map guards are never held across a social-graph lookup or a broadcast.
pub struct PresenceDirectory {
    records: DashMap<DbId, ConnectionRecord>,
    social: Arc<dyn SocialGraph>,
    broadcaster: PresenceBroadcaster,
    lookup_timeout: Duration,
}

impl PresenceDirectory {
    pub fn new(
        social: Arc<dyn SocialGraph>,
        broadcaster: PresenceBroadcaster,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            records: DashMap::new(),
            social,
            broadcaster,
            lookup_timeout,
        }
    }

    /// Upsert the user's record, then tell online friends they are online.
    ///
    /// Returns the number of friends notified.
    pub async fn connect(&self, user_id: DbId, username: &str) -> usize {
        let now = Utc::now();
        self.records.insert(
            user_id,
            ConnectionRecord {
                user_id,
                username: username.to_string(),
                connected_at: now,
            },
        );
        tracing::info!(user_id, username, "User online");

        let event = PresenceEvent {
            user_id,
            username: Some(username.to_string()),
            online: true,
            timestamp: now,
        };
        self.broadcaster
            .broadcast(&event, |id| self.records.contains_key(&id))
            .await
    }

    /// Remove the user's record; only a present-to-absent transition
    /// notifies friends. Returns the number of friends notified.
    pub async fn disconnect(&self, user_id: DbId, username: &str) -> usize {
        if self.records.remove(&user_id).is_none() {
            tracing::debug!(user_id, "Disconnect for a user with no presence record");
            return 0;
        }
        tracing::info!(user_id, username, "User offline");

        let event = PresenceEvent {
            user_id,
            username: Some(username.to_string()),
            online: false,
            timestamp: Utc::now(),
        };
        self.broadcaster
            .broadcast(&event, |id| self.records.contains_key(&id))
            .await
    }

    pub fn is_online(&self, user_id: DbId) -> bool {
        self.records.contains_key(&user_id)
    }

    pub fn record(&self, user_id: DbId) -> Option<ConnectionRecord> {
        self.records.get(&user_id).map(|r| r.clone())
    }

    pub fn online_user_ids(&self) -> HashSet<DbId> {
        self.records.iter().map(|r| *r.key()).collect()
    }

    pub fn online_count(&self) -> usize {
        self.records.len()
    }

    /// Friends of `user_id` that are currently online.
    pub async fn online_friend_ids(&self, user_id: DbId) -> Result<HashSet<DbId>, LookupError> {
        let friends =
            with_timeout(self.lookup_timeout, self.social.friend_ids_of(user_id)).await?;
        Ok(friends
            .into_iter()
            .filter(|id| self.records.contains_key(id))
            .collect())
    }

    /// Whether `viewer_id` may learn the presence of `target_id`.
    ///
    /// Users always see themselves; otherwise only friends may. Lookup
    /// failures deny.
    pub async fn can_see_presence(&self, viewer_id: DbId, target_id: DbId) -> bool {
        if viewer_id == target_id {
            return true;
        }
        match with_timeout(
            self.lookup_timeout,
            self.social.are_friends(viewer_id, target_id),
        )
        .await
        {
            Ok(friends) => friends,
            Err(e) => {
                tracing::error!(viewer_id, target_id, error = %e, "Friendship lookup failed; denying");
                false
            }
        }
    }
}
