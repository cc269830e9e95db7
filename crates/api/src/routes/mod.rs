pub mod auth;
pub mod health;
pub mod presence;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` REST route tree.
///
/// The WebSocket upgrade (`/api/v1/ws`) is registered by
/// [`build_app_router`](crate::router::build_app_router) outside the request
/// timeout.
///
/// Route hierarchy:
///
/// ```text
/// /auth/logout                revoke presented tokens (requires auth)
///
/// /presence/me                caller's own presence
/// /presence/friends           online friends of the caller
/// /presence/user/{id}         presence of a friend
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/presence", presence::router())
}
