use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use socialchat_core::stomp::ServerFrame;
use socialchat_core::types::{DbId, Timestamp};
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single WebSocket connection.
pub struct WsConnection {
    /// Set once the connection's CONNECT frame has been admitted.
    pub user_id: Option<DbId>,
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    pub connected_at: Timestamp,
    /// Subscription id -> destination, as sent by the client.
    pub subscriptions: HashMap<String, String>,
}

impl WsConnection {
    fn subscription_for(&self, destination: &str) -> Option<&str> {
        self.subscriptions
            .iter()
            .find(|(_, dest)| dest.as_str() == destination)
            .map(|(id, _)| id.as_str())
    }
}

/// Manages all active WebSocket connections and their subscriptions.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

fn message_frame(destination: &str, subscription: &str, body: &str) -> Message {
    let message_id = uuid::Uuid::new_v4().to_string();
    let frame = ServerFrame::message(destination, subscription, &message_id, body);
    Message::Text(frame.encode().into())
}

impl WsManager {
    /// Create a new, empty connection manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new, not yet authenticated connection.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(&self, conn_id: String) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            user_id: None,
            sender: tx,
            connected_at: chrono::Utc::now(),
            subscriptions: HashMap::new(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    /// Bind an authenticated user to a connection. Returns `false` if the
    /// connection is unknown.
    pub async fn attach_user(&self, conn_id: &str, user_id: DbId) -> bool {
        match self.connections.write().await.get_mut(conn_id) {
            Some(conn) => {
                conn.user_id = Some(user_id);
                true
            }
            None => false,
        }
    }

    /// Record a subscription; a repeated id replaces its destination.
    pub async fn subscribe(&self, conn_id: &str, subscription_id: &str, destination: &str) -> bool {
        match self.connections.write().await.get_mut(conn_id) {
            Some(conn) => {
                conn.subscriptions
                    .insert(subscription_id.to_string(), destination.to_string());
                true
            }
            None => false,
        }
    }

    pub async fn unsubscribe(&self, conn_id: &str, subscription_id: &str) -> bool {
        self.connections
            .write()
            .await
            .get_mut(conn_id)
            .and_then(|conn| conn.subscriptions.remove(subscription_id))
            .is_some()
    }

    /// Remove a connection by its ID.
    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    /// Push a raw message to one connection. Returns `false` if it is gone.
    pub async fn send_to(&self, conn_id: &str, message: Message) -> bool {
        match self.connections.read().await.get(conn_id) {
            Some(conn) => conn.sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Deliver `body` to a user destination (e.g. `/user/queue/presence`).
    ///
    /// Only that user's connections subscribed to `destination` receive a
    /// MESSAGE frame. Returns the number of connections delivered to.
    pub async fn send_to_user(&self, user_id: DbId, destination: &str, body: &str) -> usize {
        let conns = self.connections.read().await;
        let mut count = 0;
        for conn in conns.values().filter(|c| c.user_id == Some(user_id)) {
            if let Some(subscription) = conn.subscription_for(destination) {
                if conn
                    .sender
                    .send(message_frame(destination, subscription, body))
                    .is_ok()
                {
                    count += 1;
                }
            }
        }
        count
    }

    /// Deliver `body` to every connection subscribed to `destination`.
    ///
    /// Connections whose send channels are closed are skipped (they will be
    /// cleaned up on their next receive loop iteration).
    pub async fn publish(&self, destination: &str, body: &str) -> usize {
        let conns = self.connections.read().await;
        let mut count = 0;
        for conn in conns.values() {
            if let Some(subscription) = conn.subscription_for(destination) {
                if conn
                    .sender
                    .send(message_frame(destination, subscription, body))
                    .is_ok()
                {
                    count += 1;
                }
            }
        }
        count
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    ///
    /// Used during graceful shutdown to notify all clients before the
    /// server stops accepting new connections.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    ///
    /// Used by the heartbeat task to keep connections alive and detect
    /// stale ones.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
