//! Bearer credential parsing and validation.
//!
//! Tokens are HS256-signed JWTs carrying a [`Claims`] payload. Parsing checks
//! the signature and decodes the payload; expiry is checked separately by
//! [`validate_token_at`] so the boundary is explicit and testable.

use std::collections::HashSet;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use socialchat_core::types::{DbId, Timestamp};
use uuid::Uuid;

/// Which flow a credential may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims embedded in every credential.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Unique token identifier (UUID v4), the key of the revocation registry.
    #[serde(default)]
    pub jti: String,
    /// Subject -- the user's internal database id.
    pub sub: DbId,
    /// Display name of the user.
    #[serde(default)]
    pub username: String,
    /// Role names; empty means the default role.
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(rename = "type")]
    pub token_type: TokenKind,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
}

impl Claims {
    pub fn is_access(&self) -> bool {
        self.token_type == TokenKind::Access
    }
}

/// Why a credential was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Malformed input, bad signature, or undecodable claims.
    #[error("Invalid token")]
    Invalid,
    #[error("Token expired")]
    Expired,
}

/// Configuration for token generation and validation.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret used to sign and verify tokens.
    pub secret: String,
    /// Access token lifetime in minutes (default: 15).
    pub access_token_expiry_mins: i64,
    /// Refresh token lifetime in days (default: 7).
    pub refresh_token_expiry_days: i64,
}

/// Default access token expiry in minutes.
const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 15;
/// Default refresh token expiry in days.
const DEFAULT_REFRESH_EXPIRY_DAYS: i64 = 7;

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var                    | Required | Default |
    /// |----------------------------|----------|---------|
    /// | `JWT_SECRET`               | **yes**  | --      |
    /// | `JWT_ACCESS_EXPIRY_MINS`   | no       | `15`    |
    /// | `JWT_REFRESH_EXPIRY_DAYS`  | no       | `7`     |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is not set or is empty.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "JWT_SECRET must not be empty");

        let access_token_expiry_mins: i64 = std::env::var("JWT_ACCESS_EXPIRY_MINS")
            .unwrap_or_else(|_| DEFAULT_ACCESS_EXPIRY_MINS.to_string())
            .parse()
            .expect("JWT_ACCESS_EXPIRY_MINS must be a valid i64");

        let refresh_token_expiry_days: i64 = std::env::var("JWT_REFRESH_EXPIRY_DAYS")
            .unwrap_or_else(|_| DEFAULT_REFRESH_EXPIRY_DAYS.to_string())
            .parse()
            .expect("JWT_REFRESH_EXPIRY_DAYS must be a valid i64");

        Self {
            secret,
            access_token_expiry_mins,
            refresh_token_expiry_days,
        }
    }

    fn lifetime_secs(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.access_token_expiry_mins * 60,
            TokenKind::Refresh => self.refresh_token_expiry_days * 24 * 60 * 60,
        }
    }
}

/// Issue a signed token of the given kind with a fresh `jti`.
pub fn generate_token(
    user_id: DbId,
    username: &str,
    roles: &[&str],
    kind: TokenKind,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        jti: Uuid::new_v4().to_string(),
        sub: user_id,
        username: username.to_string(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        token_type: kind,
        iat: now,
        exp: now + config.lifetime_secs(kind),
    };
    encode_claims(&claims, config)
}

/// Sign an arbitrary claims payload.
pub fn encode_claims(
    claims: &Claims,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Verify the signature and decode the claims. Expiry is not checked.
pub fn parse_token(token: &str, config: &JwtConfig) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.required_spec_claims = HashSet::new();

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "Token failed to parse");
        TokenError::Invalid
    })
}

/// Parse and reject tokens whose expiry has passed at the current time.
pub fn validate_token(token: &str, config: &JwtConfig) -> Result<Claims, TokenError> {
    validate_token_at(token, config, Utc::now())
}

/// Parse and reject tokens with `now >= exp`.
pub fn validate_token_at(
    token: &str,
    config: &JwtConfig,
    now: Timestamp,
) -> Result<Claims, TokenError> {
    let claims = parse_token(token, config)?;
    if now.timestamp() >= claims.exp {
        return Err(TokenError::Expired);
    }
    Ok(claims)
}
