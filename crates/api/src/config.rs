use std::time::Duration;

use socialchat_core::rate_limit::{RateLimitSettings, DEFAULT_MAX_MESSAGES, DEFAULT_WINDOW};

use crate::auth::jwt::JwtConfig;

/// Which backend serves membership, friendship, message and revocation lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// Process-local maps; nothing survives a restart.
    Memory,
}

impl StoreBackend {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" => StoreBackend::Memory,
            "postgres" | "" => StoreBackend::Postgres,
            other => panic!("GATEWAY_STORE must be 'postgres' or 'memory', got '{other}'"),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on post-shutdown cleanup in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub store: StoreBackend,
    /// Per-(user, conversation) SEND budget.
    pub rate_limit: RateLimitSettings,
    /// Bound on every external lookup; exceeding it counts as a failure.
    pub lookup_timeout: Duration,
    pub revocation_cleanup_interval: Duration,
    pub rate_limit_cleanup_interval: Duration,
    /// JWT token configuration (secret, expiry durations).
    pub jwt: JwtConfig,
}

fn env_or<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + ToString,
{
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("{name} must be a valid {}", std::any::type_name::<T>()))
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                             | Default                 |
    /// |-------------------------------------|-------------------------|
    /// | `HOST`                              | `0.0.0.0`               |
    /// | `PORT`                              | `3000`                  |
    /// | `CORS_ORIGINS`                      | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`              | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`             | `30`                    |
    /// | `GATEWAY_STORE`                     | `postgres`              |
    /// | `RATE_LIMIT_MAX_MESSAGES`           | `30`                    |
    /// | `RATE_LIMIT_WINDOW_SECS`            | `60`                    |
    /// | `LOOKUP_TIMEOUT_MS`                 | `2000`                  |
    /// | `REVOCATION_CLEANUP_INTERVAL_SECS`  | `3600`                  |
    /// | `RATE_LIMIT_CLEANUP_INTERVAL_SECS`  | `600`                   |
    ///
    /// `DATABASE_URL` is read by `main.rs` when the Postgres store is used.
    /// JWT settings are documented on [`JwtConfig::from_env`].
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env_or("PORT", 3000);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let store = StoreBackend::parse(
            &std::env::var("GATEWAY_STORE").unwrap_or_else(|_| "postgres".into()),
        );

        let rate_limit = RateLimitSettings {
            max_messages: env_or("RATE_LIMIT_MAX_MESSAGES", DEFAULT_MAX_MESSAGES),
            window: Duration::from_secs(env_or("RATE_LIMIT_WINDOW_SECS", DEFAULT_WINDOW.as_secs())),
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", 30),
            store,
            rate_limit,
            lookup_timeout: Duration::from_millis(env_or("LOOKUP_TIMEOUT_MS", 2000)),
            revocation_cleanup_interval: Duration::from_secs(env_or(
                "REVOCATION_CLEANUP_INTERVAL_SECS",
                3600,
            )),
            rate_limit_cleanup_interval: Duration::from_secs(env_or(
                "RATE_LIMIT_CLEANUP_INTERVAL_SECS",
                600,
            )),
            jwt: JwtConfig::from_env(),
        }
    }
}
