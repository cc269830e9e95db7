//! Frame authorizer: the protocol state machine of the gateway.
//!
//! Each inbound frame is decided on its own; the only connection state it
//! sees is the optional [`Principal`] attached by an earlier CONNECT.
//! Decisions are returned as a tagged [`Decision`], never as errors, and
//! every infrastructure failure resolves to a rejection.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use socialchat_core::destination::{ChatAction, Destination};
use socialchat_core::rate_limit::RateLimiter;
use socialchat_core::stomp::{headers, ClientFrame, Headers};
use socialchat_core::types::{DbId, Timestamp};

use crate::auth::jwt::{validate_token_at, JwtConfig};
use crate::auth::revocation::RevocationRegistry;
use crate::gateway::principal::Principal;
use crate::lookup::{with_timeout, ConversationMembership};

// ---------------------------------------------------------------------------
// Decision types
// ---------------------------------------------------------------------------

/// Outcome of authorizing one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Admit(Admission),
    Reject(Rejection),
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admit(_))
    }
}

/// What an admitted frame is allowed to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// CONNECT succeeded; attach this principal to the connection.
    Connected(Principal),
    /// SUBSCRIBE to the classified destination.
    Subscribe(Destination),
    /// SEND may be handed to the chat dispatcher.
    Send {
        conversation_id: DbId,
        action: ChatAction,
    },
    /// UNSUBSCRIBE / DISCONNECT, which touch no protected resource.
    Control,
}

/// Broad class of a rejection, used for logging and client signalling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    Authentication,
    Authorization,
    RateLimit,
}

/// Why a frame was refused. The display text is what the client sees.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("Authentication required")]
    AuthenticationRequired,

    /// Covers bad signature, expiry, wrong kind and revocation alike.
    #[error("Invalid or expired token")]
    InvalidCredentials,

    #[error("Invalid subscription request")]
    InvalidSubscription,

    #[error("Public presence subscription is not allowed; use /user/queue/presence instead")]
    PublicPresenceDisallowed,

    #[error("Not a member of this conversation")]
    NotMember { conversation_id: DbId },

    #[error("Invalid destination")]
    UnknownDestination,

    #[error("Invalid send request")]
    InvalidSend,

    #[error("Rate limit exceeded; slow down")]
    RateLimited { conversation_id: DbId },
}

impl Rejection {
    pub fn kind(&self) -> RejectionKind {
        match self {
            Rejection::AuthenticationRequired | Rejection::InvalidCredentials => {
                RejectionKind::Authentication
            }
            Rejection::RateLimited { .. } => RejectionKind::RateLimit,
            Rejection::InvalidSubscription
            | Rejection::PublicPresenceDisallowed
            | Rejection::NotMember { .. }
            | Rejection::UnknownDestination
            | Rejection::InvalidSend => RejectionKind::Authorization,
        }
    }

    /// Stable machine-readable code for `RejectionEvent.code`.
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            Rejection::InvalidCredentials => "INVALID_CREDENTIALS",
            Rejection::InvalidSubscription => "INVALID_SUBSCRIPTION",
            Rejection::PublicPresenceDisallowed => "PUBLIC_PRESENCE_DISALLOWED",
            Rejection::NotMember { .. } => "NOT_MEMBER",
            Rejection::UnknownDestination => "UNKNOWN_DESTINATION",
            Rejection::InvalidSend => "INVALID_SEND",
            Rejection::RateLimited { .. } => "RATE_LIMITED",
        }
    }
}

// ---------------------------------------------------------------------------
// Authorizer
// ---------------------------------------------------------------------------

pub struct FrameAuthorizer {
    jwt: JwtConfig,
    revocations: Arc<RevocationRegistry>,
    membership: Arc<dyn ConversationMembership>,
    rate_limiter: Arc<RateLimiter>,
    lookup_timeout: Duration,
}

impl FrameAuthorizer {
    pub fn new(
        jwt: JwtConfig,
        revocations: Arc<RevocationRegistry>,
        membership: Arc<dyn ConversationMembership>,
        rate_limiter: Arc<RateLimiter>,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            jwt,
            revocations,
            membership,
            rate_limiter,
            lookup_timeout,
        }
    }

    /// Decide whether `frame` is admitted for the connection's `principal`.
    pub async fn authorize(&self, frame: &ClientFrame, principal: Option<&Principal>) -> Decision {
        self.authorize_at(frame, principal, Utc::now()).await
    }

    /// As [`authorize`](Self::authorize), evaluating expiry and rate windows at `now`.
    pub async fn authorize_at(
        &self,
        frame: &ClientFrame,
        principal: Option<&Principal>,
        now: Timestamp,
    ) -> Decision {
        match frame {
            ClientFrame::Connect { headers } => self.authorize_connect(headers, now).await,
            ClientFrame::Subscribe { destination, .. } => {
                self.authorize_subscribe(destination.as_deref(), principal)
                    .await
            }
            ClientFrame::Send { destination, .. } => {
                self.authorize_send(destination.as_deref(), principal, now)
                    .await
            }
            ClientFrame::Unsubscribe { .. } | ClientFrame::Disconnect { .. } => {
                Decision::Admit(Admission::Control)
            }
        }
    }

    async fn authorize_connect(&self, frame_headers: &Headers, now: Timestamp) -> Decision {
        let Some(token) = bearer_token(frame_headers) else {
            tracing::debug!("CONNECT without a bearer token");
            return Decision::Reject(Rejection::AuthenticationRequired);
        };

        // Cheapest checks first: signature and expiry, then kind, then the store.
        let claims = match validate_token_at(token, &self.jwt, now) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(reason = %e, "CONNECT rejected");
                return Decision::Reject(Rejection::InvalidCredentials);
            }
        };
        if !claims.is_access() {
            tracing::debug!(user_id = claims.sub, "CONNECT with a non-access token");
            return Decision::Reject(Rejection::InvalidCredentials);
        }
        if self.revocations.is_revoked(&claims.jti).await {
            tracing::info!(user_id = claims.sub, "CONNECT with a revoked token");
            return Decision::Reject(Rejection::InvalidCredentials);
        }

        let principal = Principal::from_claims(&claims);
        tracing::debug!(
            user_id = principal.user_id,
            username = %principal.username,
            "CONNECT authenticated"
        );
        Decision::Admit(Admission::Connected(principal))
    }

    async fn authorize_subscribe(
        &self,
        destination: Option<&str>,
        principal: Option<&Principal>,
    ) -> Decision {
        let (Some(principal), Some(raw)) = (principal, destination) else {
            return Decision::Reject(Rejection::InvalidSubscription);
        };

        let parsed = Destination::parse(raw);
        match &parsed {
            Destination::PrivateQueue => {}
            Destination::PublicPresence => {
                tracing::debug!(
                    user_id = principal.user_id,
                    "Rejected subscription to the public presence topic"
                );
                return Decision::Reject(Rejection::PublicPresenceDisallowed);
            }
            Destination::DeprecatedNotifications => {
                tracing::warn!(
                    user_id = principal.user_id,
                    destination = raw,
                    "Subscription to deprecated public notifications topic"
                );
            }
            Destination::ConversationTopic {
                conversation_id, ..
            } => {
                if !self.is_member(principal.user_id, *conversation_id).await {
                    return Decision::Reject(Rejection::NotMember {
                        conversation_id: *conversation_id,
                    });
                }
            }
            Destination::ChatSend { .. } | Destination::Unknown => {
                return Decision::Reject(Rejection::UnknownDestination);
            }
        }
        Decision::Admit(Admission::Subscribe(parsed))
    }

    async fn authorize_send(
        &self,
        destination: Option<&str>,
        principal: Option<&Principal>,
        now: Timestamp,
    ) -> Decision {
        let (Some(principal), Some(raw)) = (principal, destination) else {
            return Decision::Reject(Rejection::InvalidSend);
        };

        let Destination::ChatSend {
            conversation_id,
            action,
        } = Destination::parse(raw)
        else {
            return Decision::Reject(Rejection::UnknownDestination);
        };

        if !self.is_member(principal.user_id, conversation_id).await {
            return Decision::Reject(Rejection::NotMember { conversation_id });
        }
        if !self
            .rate_limiter
            .try_admit_at(principal.user_id, conversation_id, now)
        {
            return Decision::Reject(Rejection::RateLimited { conversation_id });
        }

        Decision::Admit(Admission::Send {
            conversation_id,
            action,
        })
    }

    /// Membership check with timeout; any failure means "not a member".
    async fn is_member(&self, user_id: DbId, conversation_id: DbId) -> bool {
        let lookup = self.membership.is_member(user_id, conversation_id);
        match with_timeout(self.lookup_timeout, lookup).await {
            Ok(member) => member,
            Err(e) => {
                tracing::error!(
                    user_id,
                    conversation_id,
                    error = %e,
                    "Membership lookup failed; denying"
                );
                false
            }
        }
    }
}

/// The non-empty token of an `Authorization: Bearer <token>` header.
fn bearer_token(frame_headers: &Headers) -> Option<&str> {
    frame_headers
        .get(headers::AUTHORIZATION)?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
