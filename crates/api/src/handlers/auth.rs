//! Handlers for the `/auth` resource.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::auth::jwt::{parse_token, TokenKind};
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Request body for `POST /auth/logout`.
#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// POST /api/v1/auth/logout
///
/// Revokes the presented access token, and the refresh token in the body if
/// it parses and belongs to the same user. A refresh token that fails either
/// check is ignored. Always 204 once the access token is revoked.
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
    body: Option<Json<LogoutRequest>>,
) -> AppResult<StatusCode> {
    state.revocations.revoke(&user.claims, user.user_id).await?;

    let refresh_token = body.and_then(|Json(input)| input.refresh_token);
    if let Some(token) = refresh_token {
        match parse_token(&token, &state.config.jwt) {
            Ok(claims) if claims.token_type == TokenKind::Refresh && claims.sub == user.user_id => {
                state.revocations.revoke(&claims, user.user_id).await?;
            }
            Ok(_) => {
                tracing::warn!(user_id = user.user_id, "Logout with a foreign or non-refresh token");
            }
            Err(e) => {
                tracing::debug!(user_id = user.user_id, error = %e, "Logout refresh token did not parse");
            }
        }
    }

    tracing::info!(user_id = user.user_id, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}
