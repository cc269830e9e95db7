//! Friendship queries over the `friend_requests` table.
//!
//! Two users are friends when an `ACCEPTED` request exists in either direction.

use socialchat_core::types::DbId;
use sqlx::PgPool;

/// Read-only access to accepted friendships.
pub struct FriendshipRepo;

impl FriendshipRepo {
    /// Ids of every accepted friend of `user_id`.
    pub async fn friend_ids(pool: &PgPool, user_id: DbId) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT CASE WHEN sender_id = $1 THEN receiver_id ELSE sender_id END
             FROM friend_requests
             WHERE (sender_id = $1 OR receiver_id = $1) AND status = 'ACCEPTED'",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Whether `a` and `b` are accepted friends.
    pub async fn are_friends(pool: &PgPool, a: DbId, b: DbId) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM friend_requests
                 WHERE ((sender_id = $1 AND receiver_id = $2)
                     OR (sender_id = $2 AND receiver_id = $1))
                   AND status = 'ACCEPTED'
             )",
        )
        .bind(a)
        .bind(b)
        .fetch_one(pool)
        .await
    }
}
