//! In-process collaborators for tests and `GATEWAY_STORE=memory`.
//!
//! A single [`InMemoryStore`] implements every lookup trait. It can be told
//! to fail or to stall so callers' fail-closed paths can be exercised.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, DashSet};
use socialchat_core::types::{DbId, Timestamp};
use socialchat_db::models::message::Message;
use socialchat_db::models::revoked_token::{CreateRevokedToken, RevokedToken};

use super::{ConversationMembership, LookupError, MessageStore, RevocationStore, SocialGraph};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    /// `(conversation_id, user_id)` pairs.
    participants: DashSet<(DbId, DbId)>,
    /// Accepted friendships, stored with the smaller id first.
    friendships: DashSet<(DbId, DbId)>,
    messages: Mutex<Vec<Message>>,
    next_message_id: AtomicI64,
    read_marks: DashMap<(DbId, DbId), Timestamp>,
    revoked: DashMap<String, RevokedToken>,
    next_revocation_id: AtomicI64,
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
}

fn friendship_key(a: DbId, b: DbId) -> (DbId, DbId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_participant(&self, conversation_id: DbId, user_id: DbId) {
        self.participants.insert((conversation_id, user_id));
    }

    pub fn remove_participant(&self, conversation_id: DbId, user_id: DbId) {
        self.participants.remove(&(conversation_id, user_id));
    }

    /// Record an accepted friendship in both directions.
    pub fn add_friendship(&self, a: DbId, b: DbId) {
        self.friendships.insert(friendship_key(a, b));
    }

    pub fn remove_friendship(&self, a: DbId, b: DbId) {
        self.friendships.remove(&friendship_key(a, b));
    }

    /// Make every subsequent call fail with [`LookupError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every subsequent call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Snapshot of persisted messages in insertion order.
    pub fn messages(&self) -> Vec<Message> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    pub fn read_mark(&self, conversation_id: DbId, user_id: DbId) -> Option<Timestamp> {
        self.read_marks
            .get(&(conversation_id, user_id))
            .map(|mark| *mark)
    }

    pub fn revoked_count(&self) -> usize {
        self.revoked.len()
    }

    async fn enter(&self) -> Result<(), LookupError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LookupError::Unavailable("in-memory store disabled".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationMembership for InMemoryStore {
    async fn is_member(&self, user_id: DbId, conversation_id: DbId) -> Result<bool, LookupError> {
        self.enter().await?;
        Ok(self.participants.contains(&(conversation_id, user_id)))
    }
}

#[async_trait]
impl SocialGraph for InMemoryStore {
    async fn friend_ids_of(&self, user_id: DbId) -> Result<HashSet<DbId>, LookupError> {
        self.enter().await?;
        Ok(self
            .friendships
            .iter()
            .filter_map(|pair| {
                let (a, b) = *pair;
                match (a == user_id, b == user_id) {
                    (true, _) => Some(b),
                    (_, true) => Some(a),
                    _ => None,
                }
            })
            .collect())
    }

    async fn are_friends(&self, a: DbId, b: DbId) -> Result<bool, LookupError> {
        self.enter().await?;
        Ok(self.friendships.contains(&friendship_key(a, b)))
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn append(
        &self,
        conversation_id: DbId,
        sender_id: DbId,
        content: &str,
    ) -> Result<Message, LookupError> {
        self.enter().await?;
        let message = Message {
            id: self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1,
            conversation_id,
            sender_id,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.messages
            .lock()
            .map_err(|_| LookupError::Unavailable("message log poisoned".into()))?
            .push(message.clone());
        Ok(message)
    }

    async fn mark_read(
        &self,
        conversation_id: DbId,
        user_id: DbId,
        read_at: Timestamp,
    ) -> Result<(), LookupError> {
        self.enter().await?;
        self.read_marks.insert((conversation_id, user_id), read_at);
        Ok(())
    }
}

#[async_trait]
impl RevocationStore for InMemoryStore {
    async fn exists(&self, token_id: &str) -> Result<bool, LookupError> {
        self.enter().await?;
        Ok(self.revoked.contains_key(token_id))
    }

    async fn insert(&self, input: &CreateRevokedToken) -> Result<bool, LookupError> {
        self.enter().await?;
        let mut created = false;
        self.revoked
            .entry(input.token_id.clone())
            .or_insert_with(|| {
                created = true;
                RevokedToken {
                    id: self.next_revocation_id.fetch_add(1, Ordering::SeqCst) + 1,
                    token_id: input.token_id.clone(),
                    user_id: input.user_id,
                    expires_at: input.expires_at,
                    revoked_at: input.revoked_at,
                }
            });
        Ok(created)
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64, LookupError> {
        self.enter().await?;
        let before = self.revoked.len();
        self.revoked.retain(|_, token| token.expires_at >= now);
        Ok(before.saturating_sub(self.revoked.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn friendships_are_symmetric() {
        let store = InMemoryStore::new();
        store.add_friendship(7, 3);
        store.add_friendship(9, 7);

        assert!(store.are_friends(3, 7).await.unwrap());
        assert_eq!(
            store.friend_ids_of(7).await.unwrap(),
            HashSet::from([3, 9])
        );
        assert!(store.friend_ids_of(4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = InMemoryStore::new();
        store.add_participant(42, 7);
        store.set_unavailable(true);

        assert!(matches!(
            store.is_member(7, 42).await,
            Err(LookupError::Unavailable(_))
        ));
        store.set_unavailable(false);
        assert!(store.is_member(7, 42).await.unwrap());
    }

    #[tokio::test]
    async fn insert_revocation_is_idempotent() {
        let store = InMemoryStore::new();
        let input = CreateRevokedToken {
            token_id: "jti-1".into(),
            user_id: 7,
            expires_at: Utc::now(),
            revoked_at: Utc::now(),
        };
        assert!(store.insert(&input).await.unwrap());
        assert!(!store.insert(&input).await.unwrap());
        assert_eq!(store.revoked_count(), 1);
    }
}
