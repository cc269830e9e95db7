use std::sync::Arc;

use socialchat_core::rate_limit::RateLimiter;

use crate::auth::revocation::RevocationRegistry;
use crate::chat::ChatDispatcher;
use crate::config::ServerConfig;
use crate::gateway::FrameAuthorizer;
use crate::lookup::Lookups;
use crate::presence::{PresenceBroadcaster, PresenceDirectory};
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager.
    pub ws_manager: Arc<WsManager>,
    pub presence: Arc<PresenceDirectory>,
    pub revocations: Arc<RevocationRegistry>,
    pub rate_limiter: Arc<RateLimiter>,
    pub authorizer: Arc<FrameAuthorizer>,
    pub chat: Arc<ChatDispatcher>,
}

impl AppState {
    /// Wire every gateway component over the given collaborators.
    pub fn new(config: ServerConfig, lookups: Lookups) -> Self {
        let timeout = config.lookup_timeout;
        let ws_manager = Arc::new(WsManager::new());
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit));
        let revocations = Arc::new(RevocationRegistry::new(lookups.revocations, timeout));

        let broadcaster =
            PresenceBroadcaster::new(lookups.social.clone(), Arc::clone(&ws_manager), timeout);
        let presence = Arc::new(PresenceDirectory::new(lookups.social, broadcaster, timeout));

        let authorizer = Arc::new(FrameAuthorizer::new(
            config.jwt.clone(),
            Arc::clone(&revocations),
            lookups.membership,
            Arc::clone(&rate_limiter),
            timeout,
        ));
        let chat = Arc::new(ChatDispatcher::new(
            lookups.messages,
            Arc::clone(&ws_manager),
            timeout,
        ));

        Self {
            config: Arc::new(config),
            ws_manager,
            presence,
            revocations,
            rate_limiter,
            authorizer,
            chat,
        }
    }
}
