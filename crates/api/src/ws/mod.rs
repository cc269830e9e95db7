//! WebSocket infrastructure for the real-time gateway.
//!
//! Provides connection and subscription management, heartbeat pings, and
//! the HTTP upgrade handler that runs the per-connection STOMP session.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
