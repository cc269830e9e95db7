use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use socialchat_api::background::{rate_limit_cleanup, revocation_cleanup};
use socialchat_api::config::{ServerConfig, StoreBackend};
use socialchat_api::lookup::memory::InMemoryStore;
use socialchat_api::lookup::Lookups;
use socialchat_api::router::build_app_router;
use socialchat_api::state::AppState;
use socialchat_api::ws;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "socialchat_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        store = ?config.store,
        "Loaded server configuration"
    );

    // --- Collaborators ---
    let lookups = match config.store {
        StoreBackend::Postgres => {
            let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

            let pool = socialchat_db::create_pool(&database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            socialchat_db::health_check(&pool)
                .await
                .expect("Database health check failed");

            socialchat_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Lookups::postgres(pool)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; state is lost on restart");
            Lookups::in_memory(Arc::new(InMemoryStore::new()))
        }
    };

    // --- App state ---
    let state = AppState::new(config.clone(), lookups);

    // --- Background tasks ---
    let cancel = CancellationToken::new();
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&state.ws_manager), cancel.clone());
    let revocation_handle = tokio::spawn(revocation_cleanup::run(
        Arc::clone(&state.revocations),
        config.revocation_cleanup_interval,
        cancel.clone(),
    ));
    let rate_limit_handle = tokio::spawn(rate_limit_cleanup::run(
        Arc::clone(&state.rate_limiter),
        config.rate_limit_cleanup_interval,
        cancel.clone(),
    ));
    tracing::info!("Background tasks started (heartbeat, revocation cleanup, rate limit cleanup)");

    let ws_manager = Arc::clone(&state.ws_manager);
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    cancel.cancel();
    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    for (name, handle) in [
        ("heartbeat", heartbeat_handle),
        ("revocation cleanup", revocation_handle),
        ("rate limit cleanup", rate_limit_handle),
    ] {
        if tokio::time::timeout(drain, handle).await.is_err() {
            tracing::warn!(task = name, "Background task did not stop in time");
        }
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
