use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use socialchat_core::destination::ERRORS_QUEUE;
use socialchat_core::events::RejectionEvent;
use socialchat_core::stomp::{ClientFrame, ServerFrame};

use crate::gateway::{Admission, Decision, Principal, Rejection, RejectionKind};
use crate::state::AppState;

/// STOMP heart-beat advertised in CONNECTED; liveness is kept by WebSocket pings.
const STOMP_HEART_BEAT: &str = "0,0";

/// How long queued frames may take to flush after the session ends.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the connection is registered with `WsManager` and
/// managed by two tasks (sender + receive loop).
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Whether the receive loop keeps going after a frame.
enum Flow {
    Continue,
    Close,
}

/// Per-connection state: only the principal survives between frames.
struct Session {
    conn_id: String,
    principal: Option<Principal>,
    state: AppState,
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Processes inbound frames sequentially on the current task.
///   4. Cleans up on disconnect, including the presence record.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    let mut rx = state.ws_manager.add(conn_id.clone()).await;
    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_conn_id = conn_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    let mut session = Session {
        conn_id: conn_id.clone(),
        principal: None,
        state: state.clone(),
    };

    // Receiver loop: frames of one connection are handled in arrival order.
    while let Some(result) = stream.next().await {
        let flow = match result {
            Ok(Message::Text(text)) => session.handle_text(text.as_str()).await,
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => session.handle_text(text).await,
                Err(_) => session.protocol_error("Binary frames must be UTF-8").await,
            },
            Ok(Message::Close(_)) => Flow::Close,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
                Flow::Continue
            }
            Ok(Message::Ping(_)) => Flow::Continue,
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                Flow::Close
            }
        };
        if matches!(flow, Flow::Close) {
            break;
        }
    }

    // Clean up: dropping the registered sender lets queued frames flush.
    state.ws_manager.remove(&conn_id).await;
    if let Some(principal) = session.principal.take() {
        state
            .presence
            .disconnect(principal.user_id, &principal.username)
            .await;
    }
    if tokio::time::timeout(FLUSH_TIMEOUT, &mut send_task)
        .await
        .is_err()
    {
        send_task.abort();
    }
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}

impl Session {
    async fn handle_text(&mut self, text: &str) -> Flow {
        match ClientFrame::decode(text) {
            Ok(Some(frame)) => self.handle_frame(frame).await,
            // Heart-beat EOLs.
            Ok(None) => Flow::Continue,
            Err(e) => {
                tracing::debug!(conn_id = %self.conn_id, error = %e, "Malformed STOMP frame");
                self.protocol_error(&e.to_string()).await
            }
        }
    }

    async fn handle_frame(&mut self, frame: ClientFrame) -> Flow {
        if matches!(frame, ClientFrame::Connect { .. }) && self.principal.is_some() {
            return self.protocol_error("Already connected").await;
        }

        let decision = self
            .state
            .authorizer
            .authorize(&frame, self.principal.as_ref())
            .await;

        match decision {
            Decision::Admit(admission) => self.admit(frame, admission).await,
            Decision::Reject(rejection) => self.reject(&frame, rejection).await,
        }
    }

    async fn admit(&mut self, frame: ClientFrame, admission: Admission) -> Flow {
        match (admission, frame) {
            (Admission::Connected(principal), _) => {
                self.state
                    .ws_manager
                    .attach_user(&self.conn_id, principal.user_id)
                    .await;
                self.send(ServerFrame::connected(STOMP_HEART_BEAT)).await;
                self.state
                    .presence
                    .connect(principal.user_id, &principal.username)
                    .await;
                tracing::info!(
                    conn_id = %self.conn_id,
                    user_id = principal.user_id,
                    "STOMP session established"
                );
                self.principal = Some(principal);
                Flow::Continue
            }
            (
                Admission::Subscribe(_),
                ClientFrame::Subscribe {
                    id,
                    destination: Some(destination),
                    receipt,
                },
            ) => {
                let subscription_id = id.unwrap_or_else(|| destination.clone());
                self.state
                    .ws_manager
                    .subscribe(&self.conn_id, &subscription_id, &destination)
                    .await;
                tracing::debug!(
                    conn_id = %self.conn_id,
                    subscription_id = %subscription_id,
                    destination = %destination,
                    "Subscribed"
                );
                self.send_receipt(receipt.as_deref()).await;
                Flow::Continue
            }
            (
                Admission::Send {
                    conversation_id,
                    action,
                },
                ClientFrame::Send { body, receipt, .. },
            ) => {
                if let Some(principal) = &self.principal {
                    // Failures are logged and reported to the sender by the dispatcher.
                    match self
                        .state
                        .chat
                        .dispatch(principal, conversation_id, action, &body)
                        .await
                    {
                        Ok(delivered) => tracing::trace!(
                            conn_id = %self.conn_id,
                            conversation_id,
                            delivered,
                            "SEND dispatched"
                        ),
                        Err(e) => tracing::trace!(
                            conn_id = %self.conn_id,
                            conversation_id,
                            code = e.code(),
                            "SEND not dispatched"
                        ),
                    }
                }
                self.send_receipt(receipt.as_deref()).await;
                Flow::Continue
            }
            (Admission::Control, ClientFrame::Unsubscribe { id, receipt }) => {
                if let Some(id) = id {
                    self.state.ws_manager.unsubscribe(&self.conn_id, &id).await;
                }
                self.send_receipt(receipt.as_deref()).await;
                Flow::Continue
            }
            (Admission::Control, ClientFrame::Disconnect { receipt }) => {
                self.send_receipt(receipt.as_deref()).await;
                Flow::Close
            }
            (admission, frame) => {
                tracing::error!(
                    conn_id = %self.conn_id,
                    command = frame.command(),
                    ?admission,
                    "Admission does not match frame"
                );
                Flow::Continue
            }
        }
    }

    async fn reject(&mut self, frame: &ClientFrame, rejection: Rejection) -> Flow {
        // Without a principal there is no private queue to report to.
        let Some(principal) = &self.principal else {
            tracing::debug!(
                conn_id = %self.conn_id,
                command = frame.command(),
                code = rejection.code(),
                "Frame rejected before authentication"
            );
            self.send(ServerFrame::error(&rejection.to_string(), ""))
                .await;
            self.send_raw(Message::Close(None)).await;
            return Flow::Close;
        };

        match rejection.kind() {
            RejectionKind::RateLimit => tracing::info!(
                user_id = principal.user_id,
                command = frame.command(),
                code = rejection.code(),
                "Frame rate limited"
            ),
            _ => tracing::debug!(
                user_id = principal.user_id,
                command = frame.command(),
                code = rejection.code(),
                "Frame rejected"
            ),
        }

        let destination = match frame {
            ClientFrame::Subscribe { destination, .. } | ClientFrame::Send { destination, .. } => {
                destination.clone()
            }
            _ => None,
        };
        let event = RejectionEvent {
            code: rejection.code().to_string(),
            message: rejection.to_string(),
            destination,
        };
        match serde_json::to_string(&event) {
            Ok(body) => {
                self.state
                    .ws_manager
                    .send_to_user(principal.user_id, ERRORS_QUEUE, &body)
                    .await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to serialize rejection event"),
        }
        Flow::Continue
    }

    /// Answer a protocol violation with ERROR and close the socket.
    async fn protocol_error(&mut self, message: &str) -> Flow {
        self.send(ServerFrame::error(message, "")).await;
        self.send_raw(Message::Close(None)).await;
        Flow::Close
    }

    async fn send_receipt(&self, receipt: Option<&str>) {
        if let Some(receipt) = receipt {
            self.send(ServerFrame::receipt(receipt)).await;
        }
    }

    async fn send(&self, frame: ServerFrame) {
        self.send_raw(Message::Text(frame.encode().into())).await;
    }

    async fn send_raw(&self, message: Message) {
        if !self.state.ws_manager.send_to(&self.conn_id, message).await {
            tracing::debug!(conn_id = %self.conn_id, "Connection gone before reply");
        }
    }
}
