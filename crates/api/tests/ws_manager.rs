//! Unit tests for `WsManager`.
//!
//! These tests exercise the WebSocket connection manager directly, without
//! performing any HTTP upgrades. They verify add/remove semantics,
//! subscription-scoped delivery, and graceful shutdown behaviour.

use axum::extract::ws::Message;
use socialchat_api::ws::WsManager;
use tokio::sync::mpsc::UnboundedReceiver;

fn texts(rx: &mut UnboundedReceiver<Message>) -> Vec<String> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        if let Message::Text(text) = msg {
            out.push(text.as_str().to_string());
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Test: add() and remove() track the connection count
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_and_remove_track_connection_count() {
    let manager = WsManager::new();
    assert_eq!(manager.connection_count().await, 0);

    let _rx = manager.add("conn-1".to_string()).await;
    assert_eq!(manager.connection_count().await, 1);

    manager.remove("nonexistent").await;
    assert_eq!(manager.connection_count().await, 1);

    manager.remove("conn-1").await;
    assert_eq!(manager.connection_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: send_to_user() needs both the user and the subscription
// ---------------------------------------------------------------------------

#[tokio::test]
async fn send_to_user_targets_subscribed_connections_of_that_user() {
    let manager = WsManager::new();
    let mut rx1 = manager.add("conn-1".to_string()).await;
    let mut rx2 = manager.add("conn-2".to_string()).await;
    let mut rx3 = manager.add("conn-3".to_string()).await;
    manager.attach_user("conn-1", 7).await;
    manager.attach_user("conn-2", 7).await;
    manager.attach_user("conn-3", 8).await;
    manager.subscribe("conn-1", "s1", "/user/queue/errors").await;
    manager.subscribe("conn-3", "s3", "/user/queue/errors").await;

    let delivered = manager
        .send_to_user(7, "/user/queue/errors", r#"{"code":"X"}"#)
        .await;
    assert_eq!(delivered, 1);

    let to_1 = texts(&mut rx1);
    assert_eq!(to_1.len(), 1);
    assert!(to_1[0].contains("subscription:s1"));
    assert!(to_1[0].ends_with("{\"code\":\"X\"}\0"));
    assert!(texts(&mut rx2).is_empty());
    assert!(texts(&mut rx3).is_empty());
}

// ---------------------------------------------------------------------------
// Test: publish() reaches every subscriber of a topic, until unsubscribed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn publish_reaches_topic_subscribers() {
    let manager = WsManager::new();
    let mut rx1 = manager.add("conn-1".to_string()).await;
    let mut rx2 = manager.add("conn-2".to_string()).await;
    let topic = "/topic/conversations/42/messages";
    manager.subscribe("conn-1", "a", topic).await;
    manager.subscribe("conn-2", "b", topic).await;

    assert_eq!(manager.publish(topic, "{}").await, 2);
    assert!(manager.unsubscribe("conn-2", "b").await);
    assert!(!manager.unsubscribe("conn-2", "b").await);
    assert_eq!(manager.publish(topic, "{}").await, 1);

    assert_eq!(texts(&mut rx1).len(), 2);
    assert_eq!(texts(&mut rx2).len(), 1);
}

// ---------------------------------------------------------------------------
// Test: operations on unknown connections report failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_connection_operations_return_false() {
    let manager = WsManager::new();

    assert!(!manager.attach_user("ghost", 1).await);
    assert!(!manager.subscribe("ghost", "s", "/user/queue/x").await);
    assert!(!manager.send_to("ghost", Message::Close(None)).await);
}

// ---------------------------------------------------------------------------
// Test: shutdown_all() sends Close and clears all connections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_all_sends_close_and_clears() {
    let manager = WsManager::new();
    let mut rx1 = manager.add("conn-1".to_string()).await;
    let mut rx2 = manager.add("conn-2".to_string()).await;

    manager.shutdown_all().await;

    assert_eq!(manager.connection_count().await, 0);
    assert!(matches!(rx1.recv().await, Some(Message::Close(None))));
    assert!(matches!(rx2.recv().await, Some(Message::Close(None))));
}

// ---------------------------------------------------------------------------
// Test: ping_all() sends a Ping to every connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ping_all_sends_ping() {
    let manager = WsManager::new();
    let mut rx = manager.add("conn-1".to_string()).await;

    manager.ping_all().await;

    assert!(matches!(rx.recv().await, Some(Message::Ping(_))));
}
