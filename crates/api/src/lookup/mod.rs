//! External collaborators consulted by the gateway.
//!
//! Every trait here is object-safe and injected as `Arc<dyn ...>`:
//!
//! - [`ConversationMembership`] -- is a user a participant of a conversation.
//! - [`SocialGraph`] -- accepted friendships.
//! - [`MessageStore`] -- persistence of admitted chat messages.
//! - [`RevocationStore`] -- durable set of revoked credential ids.
//!
//! [`postgres`] backs them with the relational store; [`memory`] keeps them
//! in process for tests and local development.

pub mod memory;
pub mod postgres;

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use socialchat_core::types::{DbId, Timestamp};
use socialchat_db::models::message::Message;
use socialchat_db::models::revoked_token::CreateRevokedToken;

/// Infrastructure failure while talking to an external collaborator.
///
/// Callers on the authorization path map every variant to the
/// fail-closed decision.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ConversationMembership: Send + Sync {
    async fn is_member(&self, user_id: DbId, conversation_id: DbId) -> Result<bool, LookupError>;
}

#[async_trait]
pub trait SocialGraph: Send + Sync {
    /// Ids of every accepted friend of `user_id`.
    async fn friend_ids_of(&self, user_id: DbId) -> Result<HashSet<DbId>, LookupError>;

    async fn are_friends(&self, a: DbId, b: DbId) -> Result<bool, LookupError>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message that has already been authorized.
    async fn append(
        &self,
        conversation_id: DbId,
        sender_id: DbId,
        content: &str,
    ) -> Result<Message, LookupError>;

    /// Record that `user_id` has read `conversation_id` up to `read_at`.
    async fn mark_read(
        &self,
        conversation_id: DbId,
        user_id: DbId,
        read_at: Timestamp,
    ) -> Result<(), LookupError>;
}

#[async_trait]
pub trait RevocationStore: Send + Sync {
    async fn exists(&self, token_id: &str) -> Result<bool, LookupError>;

    /// Insert a revocation. Returns `false` if the id was already present.
    async fn insert(&self, input: &CreateRevokedToken) -> Result<bool, LookupError>;

    /// Delete entries whose natural expiry is before `now`.
    async fn delete_expired(&self, now: Timestamp) -> Result<u64, LookupError>;
}

/// The full set of collaborators wired into [`AppState`](crate::state::AppState).
#[derive(Clone)]
pub struct Lookups {
    pub membership: Arc<dyn ConversationMembership>,
    pub social: Arc<dyn SocialGraph>,
    pub messages: Arc<dyn MessageStore>,
    pub revocations: Arc<dyn RevocationStore>,
}

impl Lookups {
    /// All collaborators backed by Postgres.
    pub fn postgres(pool: socialchat_db::DbPool) -> Self {
        let store = Arc::new(postgres::PgStore::new(pool));
        Self::from_store(store)
    }

    /// All collaborators backed by one shared in-memory store.
    pub fn in_memory(store: Arc<memory::InMemoryStore>) -> Self {
        Self::from_store(store)
    }

    fn from_store<S>(store: Arc<S>) -> Self
    where
        S: ConversationMembership + SocialGraph + MessageStore + RevocationStore + 'static,
    {
        Self {
            membership: store.clone(),
            social: store.clone(),
            messages: store.clone(),
            revocations: store,
        }
    }
}

/// Run a lookup with an upper bound on its latency.
pub async fn with_timeout<T, F>(limit: Duration, lookup: F) -> Result<T, LookupError>
where
    F: Future<Output = Result<T, LookupError>>,
{
    match tokio::time::timeout(limit, lookup).await {
        Ok(result) => result,
        Err(_) => Err(LookupError::Timeout(limit)),
    }
}
