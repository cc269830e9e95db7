#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use socialchat_core::rate_limit::RateLimitSettings;
use socialchat_core::types::DbId;
use tower::ServiceExt;

use socialchat_api::auth::jwt::{generate_token, JwtConfig, TokenKind};
use socialchat_api::config::{ServerConfig, StoreBackend};
use socialchat_api::lookup::memory::InMemoryStore;
use socialchat_api::lookup::Lookups;
use socialchat_api::router::build_app_router;
use socialchat_api::state::AppState;

pub const TEST_SECRET: &str = "integration-test-secret-long-enough";

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        secret: TEST_SECRET.to_string(),
        access_token_expiry_mins: 15,
        refresh_token_expiry_days: 7,
    }
}

/// Build a test `ServerConfig` with safe defaults and the in-memory store.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        store: StoreBackend::Memory,
        rate_limit: RateLimitSettings::default(),
        lookup_timeout: Duration::from_millis(200),
        revocation_cleanup_interval: Duration::from_secs(3600),
        rate_limit_cleanup_interval: Duration::from_secs(600),
        jwt: jwt_config(),
    }
}

/// A fully wired gateway over an in-memory store the test can manipulate.
pub struct TestGateway {
    pub store: Arc<InMemoryStore>,
    pub state: AppState,
}

impl TestGateway {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let state = AppState::new(config, Lookups::in_memory(store.clone()));
        Self { store, state }
    }

    pub fn app(&self) -> Router {
        build_app_router(self.state.clone(), &self.state.config)
    }
}

pub fn access_token(user_id: DbId, username: &str) -> String {
    generate_token(user_id, username, &[], TokenKind::Access, &jwt_config())
        .expect("token generation should succeed")
}

pub fn refresh_token(user_id: DbId, username: &str) -> String {
    generate_token(user_id, username, &[], TokenKind::Refresh, &jwt_config())
        .expect("token generation should succeed")
}

/// Send a GET with an optional bearer token.
pub async fn get(app: Router, uri: &str, token: Option<&str>) -> Response<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    app.oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Send a POST with a JSON body and an optional bearer token.
pub async fn post_json(
    app: Router,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    app.oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
