//! End-to-end STOMP sessions over a real WebSocket against an in-process server.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use socialchat_core::rate_limit::RateLimitSettings;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use common::{access_token, refresh_token, test_config, TestGateway};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(gw: &TestGateway) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = gw.app();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn open(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/api/v1/ws"))
        .await
        .expect("WebSocket handshake should succeed");
    client
}

fn frame(command: &str, headers: &[(&str, &str)], body: &str) -> Message {
    let mut text = format!("{command}\n");
    for (name, value) in headers {
        text.push_str(&format!("{name}:{value}\n"));
    }
    text.push('\n');
    text.push_str(body);
    text.push('\0');
    Message::text(text)
}

/// Next STOMP frame text, skipping pings. `None` once the socket closes.
async fn next_frame(client: &mut Client) -> Option<String> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("server should answer within 2s")?;
        match msg {
            Ok(Message::Text(text)) => return Some(text.as_str().to_string()),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(other) => panic!("unexpected message {other:?}"),
        }
    }
}

async fn expect_frame(client: &mut Client, command: &str) -> String {
    let text = next_frame(client).await.expect("socket closed early");
    assert!(
        text.starts_with(&format!("{command}\n")),
        "expected {command}, got {text:?}"
    );
    text
}

async fn stomp_connect(client: &mut Client, token: &str) {
    let bearer = format!("Bearer {token}");
    client
        .send(frame(
            "CONNECT",
            &[("accept-version", "1.2"), ("Authorization", &bearer)],
            "",
        ))
        .await
        .unwrap();
    expect_frame(client, "CONNECTED").await;
}

async fn stomp_subscribe(client: &mut Client, id: &str, destination: &str) {
    client
        .send(frame(
            "SUBSCRIBE",
            &[("id", id), ("destination", destination), ("receipt", id)],
            "",
        ))
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Test: full session for user 7
// ---------------------------------------------------------------------------

#[tokio::test]
async fn authorized_session_flow() {
    let gw = TestGateway::new();
    let addr = serve(&gw).await;
    let mut client = open(addr).await;

    stomp_connect(&mut client, &access_token(7, "seven")).await;
    assert!(gw.state.presence.is_online(7));

    stomp_subscribe(&mut client, "errors", "/user/queue/errors").await;
    assert!(expect_frame(&mut client, "RECEIPT").await.contains("receipt-id:errors"));

    // Not a member yet: reported on the errors queue, no receipt.
    stomp_subscribe(&mut client, "conv", "/topic/conversations/42/messages").await;
    let rejected = expect_frame(&mut client, "MESSAGE").await;
    assert!(rejected.contains("destination:/user/queue/errors"));
    assert!(rejected.contains(r#""code":"NOT_MEMBER""#));
    assert!(rejected.contains("Not a member of this conversation"));

    // Public presence is refused, the session survives.
    stomp_subscribe(&mut client, "presence", "/topic/presence").await;
    let rejected = expect_frame(&mut client, "MESSAGE").await;
    assert!(rejected.contains(r#""code":"PUBLIC_PRESENCE_DISALLOWED""#));

    gw.store.add_participant(42, 7);
    stomp_subscribe(&mut client, "conv", "/topic/conversations/42/messages").await;
    expect_frame(&mut client, "RECEIPT").await;

    client
        .send(frame(
            "SEND",
            &[("destination", "/app/chat/42/message"), ("receipt", "m1")],
            r#"{"content":"hello"}"#,
        ))
        .await
        .unwrap();
    let delivered = expect_frame(&mut client, "MESSAGE").await;
    assert!(delivered.contains("destination:/topic/conversations/42/messages"));
    assert!(delivered.contains("subscription:conv"));
    assert!(delivered.contains(r#""content":"hello""#));
    assert!(expect_frame(&mut client, "RECEIPT").await.contains("receipt-id:m1"));

    client
        .send(frame("DISCONNECT", &[("receipt", "bye")], ""))
        .await
        .unwrap();
    assert!(expect_frame(&mut client, "RECEIPT").await.contains("receipt-id:bye"));
    assert!(next_frame(&mut client).await.is_none());

    // Presence is cleared once the session task finishes.
    for _ in 0..50 {
        if !gw.state.presence.is_online(7) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!gw.state.presence.is_online(7));
}

// ---------------------------------------------------------------------------
// Test: rejected CONNECT gets ERROR and the socket is closed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refresh_token_connect_is_refused() {
    let gw = TestGateway::new();
    let addr = serve(&gw).await;
    let mut client = open(addr).await;

    let bearer = format!("Bearer {}", refresh_token(7, "seven"));
    client
        .send(frame("CONNECT", &[("Authorization", &bearer)], ""))
        .await
        .unwrap();

    let error = expect_frame(&mut client, "ERROR").await;
    assert!(error.contains("message:Invalid or expired token"));
    assert!(next_frame(&mut client).await.is_none());
    assert!(!gw.state.presence.is_online(7));
}

#[tokio::test]
async fn frames_before_connect_are_refused() {
    let gw = TestGateway::new();
    let addr = serve(&gw).await;
    let mut client = open(addr).await;

    client
        .send(frame(
            "SEND",
            &[("destination", "/app/chat/42/message")],
            r#"{"content":"sneaky"}"#,
        ))
        .await
        .unwrap();

    let error = expect_frame(&mut client, "ERROR").await;
    assert!(error.contains("message:Invalid send request"));
    assert!(next_frame(&mut client).await.is_none());
    assert!(gw.store.messages().is_empty());
}

#[tokio::test]
async fn malformed_frame_closes_session() {
    let gw = TestGateway::new();
    let addr = serve(&gw).await;
    let mut client = open(addr).await;

    client
        .send(Message::text("CONNECT\nno-terminator\n\n".to_string()))
        .await
        .unwrap();

    expect_frame(&mut client, "ERROR").await;
    assert!(next_frame(&mut client).await.is_none());
}

// ---------------------------------------------------------------------------
// Test: rate limit surfaces on the errors queue
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rate_limited_send_is_reported() {
    let mut config = test_config();
    config.rate_limit = RateLimitSettings {
        max_messages: 2,
        window: Duration::from_secs(60),
    };
    let gw = TestGateway::with_config(config);
    gw.store.add_participant(42, 7);
    let addr = serve(&gw).await;
    let mut client = open(addr).await;

    stomp_connect(&mut client, &access_token(7, "seven")).await;
    stomp_subscribe(&mut client, "errors", "/user/queue/errors").await;
    expect_frame(&mut client, "RECEIPT").await;

    for i in 0..3 {
        let receipt = format!("m{i}");
        client
            .send(frame(
                "SEND",
                &[("destination", "/app/chat/42/message"), ("receipt", &receipt)],
                r#"{"content":"hi"}"#,
            ))
            .await
            .unwrap();
    }
    expect_frame(&mut client, "RECEIPT").await;
    expect_frame(&mut client, "RECEIPT").await;
    let limited = expect_frame(&mut client, "MESSAGE").await;
    assert!(limited.contains(r#""code":"RATE_LIMITED""#));
    assert_eq!(gw.store.messages().len(), 2);
}

// ---------------------------------------------------------------------------
// Test: a friend's socket is told when the user comes online
// ---------------------------------------------------------------------------

#[tokio::test]
async fn friend_receives_presence_over_websocket() {
    let gw = TestGateway::new();
    gw.store.add_friendship(7, 1);
    let addr = serve(&gw).await;

    let mut friend = open(addr).await;
    stomp_connect(&mut friend, &access_token(1, "one")).await;
    stomp_subscribe(&mut friend, "presence", "/user/queue/presence").await;
    expect_frame(&mut friend, "RECEIPT").await;

    let mut user = open(addr).await;
    stomp_connect(&mut user, &access_token(7, "seven")).await;

    let event = expect_frame(&mut friend, "MESSAGE").await;
    assert!(event.contains("destination:/user/queue/presence"));
    assert!(event.contains(r#""userId":7"#));
    assert!(event.contains(r#""online":true"#));
}

// ---------------------------------------------------------------------------
// Test: a SEND the dispatcher refuses is reported and still receipted
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refused_message_is_reported_and_session_continues() {
    let gw = TestGateway::new();
    gw.store.add_participant(42, 7);
    let addr = serve(&gw).await;
    let mut client = open(addr).await;

    stomp_connect(&mut client, &access_token(7, "seven")).await;
    stomp_subscribe(&mut client, "errors", "/user/queue/errors").await;
    expect_frame(&mut client, "RECEIPT").await;

    client
        .send(frame(
            "SEND",
            &[("destination", "/app/chat/42/message"), ("receipt", "blank")],
            r#"{"content":"   "}"#,
        ))
        .await
        .unwrap();
    let reported = expect_frame(&mut client, "MESSAGE").await;
    assert!(reported.contains(r#""code":"VALIDATION_ERROR""#));
    assert!(expect_frame(&mut client, "RECEIPT").await.contains("receipt-id:blank"));
    assert!(gw.store.messages().is_empty());

    client
        .send(frame(
            "SEND",
            &[("destination", "/app/chat/42/message"), ("receipt", "ok")],
            r#"{"content":"second try"}"#,
        ))
        .await
        .unwrap();
    assert!(expect_frame(&mut client, "RECEIPT").await.contains("receipt-id:ok"));
    assert_eq!(gw.store.messages().len(), 1);
}
