//! Handlers for the `/presence` resource.
//!
//! Every answer is gated by friendship: users can see their own presence and
//! their friends', nobody else's.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use socialchat_core::error::CoreError;
use socialchat_core::events::PresenceEvent;
use socialchat_core::types::DbId;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Response for `GET /presence/me`.
#[derive(Debug, Serialize)]
pub struct OwnPresence {
    pub online: bool,
}

/// GET /api/v1/presence/me
pub async fn me(State(state): State<AppState>, user: AuthUser) -> Json<OwnPresence> {
    Json(OwnPresence {
        online: state.presence.is_online(user.user_id),
    })
}

/// GET /api/v1/presence/friends
///
/// Ids of the caller's friends that are online, sorted ascending.
pub async fn online_friends(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<Vec<DbId>>>> {
    let mut ids: Vec<DbId> = state
        .presence
        .online_friend_ids(user.user_id)
        .await?
        .into_iter()
        .collect();
    ids.sort_unstable();
    Ok(Json(DataResponse { data: ids }))
}

/// GET /api/v1/presence/user/{id}
///
/// Answers 404 both for strangers and for unknown users, so the response
/// reveals nothing about the friend graph.
pub async fn user_presence(
    State(state): State<AppState>,
    user: AuthUser,
    Path(target_id): Path<DbId>,
) -> AppResult<Json<PresenceEvent>> {
    if !state.presence.can_see_presence(user.user_id, target_id).await {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Presence",
            id: target_id,
        }));
    }

    let event = match state.presence.record(target_id) {
        Some(record) => PresenceEvent {
            user_id: target_id,
            username: Some(record.username),
            online: true,
            timestamp: record.connected_at,
        },
        None => PresenceEvent {
            user_id: target_id,
            username: None,
            online: false,
            timestamp: Utc::now(),
        },
    };
    Ok(Json(event))
}
