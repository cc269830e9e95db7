//! Postgres-backed collaborators, delegating to `socialchat_db` repositories.

use std::collections::HashSet;

use async_trait::async_trait;
use socialchat_core::types::{DbId, Timestamp};
use socialchat_db::models::message::Message;
use socialchat_db::models::revoked_token::CreateRevokedToken;
use socialchat_db::repositories::{FriendshipRepo, MessageRepo, ParticipantRepo, RevokedTokenRepo};
use socialchat_db::DbPool;

use super::{ConversationMembership, LookupError, MessageStore, RevocationStore, SocialGraph};

/// Implements every lookup trait over a single connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationMembership for PgStore {
    async fn is_member(&self, user_id: DbId, conversation_id: DbId) -> Result<bool, LookupError> {
        Ok(ParticipantRepo::is_member(&self.pool, conversation_id, user_id).await?)
    }
}

#[async_trait]
impl SocialGraph for PgStore {
    async fn friend_ids_of(&self, user_id: DbId) -> Result<HashSet<DbId>, LookupError> {
        let ids = FriendshipRepo::friend_ids(&self.pool, user_id).await?;
        Ok(ids.into_iter().collect())
    }

    async fn are_friends(&self, a: DbId, b: DbId) -> Result<bool, LookupError> {
        Ok(FriendshipRepo::are_friends(&self.pool, a, b).await?)
    }
}

#[async_trait]
impl MessageStore for PgStore {
    async fn append(
        &self,
        conversation_id: DbId,
        sender_id: DbId,
        content: &str,
    ) -> Result<Message, LookupError> {
        Ok(MessageRepo::append(&self.pool, conversation_id, sender_id, content).await?)
    }

    async fn mark_read(
        &self,
        conversation_id: DbId,
        user_id: DbId,
        read_at: Timestamp,
    ) -> Result<(), LookupError> {
        let updated =
            ParticipantRepo::update_last_read_at(&self.pool, conversation_id, user_id, read_at)
                .await?;
        if !updated {
            tracing::debug!(conversation_id, user_id, "Read mark matched no participant row");
        }
        Ok(())
    }
}

#[async_trait]
impl RevocationStore for PgStore {
    async fn exists(&self, token_id: &str) -> Result<bool, LookupError> {
        Ok(RevokedTokenRepo::exists(&self.pool, token_id).await?)
    }

    async fn insert(&self, input: &CreateRevokedToken) -> Result<bool, LookupError> {
        Ok(RevokedTokenRepo::insert(&self.pool, input).await?)
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64, LookupError> {
        Ok(RevokedTokenRepo::delete_expired(&self.pool, now).await?)
    }
}
