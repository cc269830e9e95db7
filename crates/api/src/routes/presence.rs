//! Route definitions for the `/presence` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::presence;
use crate::state::AppState;

/// Routes mounted at `/presence`.
///
/// ```text
/// GET /me          -> me
/// GET /friends     -> online_friends
/// GET /user/{id}   -> user_presence
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(presence::me))
        .route("/friends", get(presence::online_friends))
        .route("/user/{id}", get(presence::user_presence))
}
