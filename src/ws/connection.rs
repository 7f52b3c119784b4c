//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection:
//! dispatches incoming commands to the [`ConnectionLifecycle`] and drains
//! the connection's outbound queue from the [`ConnectionHub`].
//!
//! [`ConnectionLifecycle`]: crate::service::ConnectionLifecycle
//! [`ConnectionHub`]: crate::transport::ConnectionHub

use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, StreamExt};

use super::messages::{WsCommand, WsMessage, WsMessageType};
use crate::app_state::AppState;
use crate::auth::Identity;
use crate::domain::ConnectionId;
use crate::error::HubError;
use crate::service::MembershipChange;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Opens a hub session and joins `groups`, replaying their history.
/// - Reads commands from the client and dispatches them.
/// - Forwards notifications and history batches queued by the hub.
///
/// On exit the hub session is closed before the registry entry is removed,
/// so no delivery targets a connection the registry no longer knows.
pub async fn run_connection(
    socket: WebSocket,
    state: AppState,
    identity: Identity,
    groups: Vec<String>,
) {
    let connection_id = ConnectionId::new();
    let mut outbound = state.hub.register(connection_id.clone()).await;
    let (mut ws_tx, mut ws_rx) = socket.split();

    let welcome = match state
        .lifecycle
        .on_connect(&connection_id, &identity.user_id, &groups)
        .await
    {
        Ok(change) => Some(change_response(
            connection_id.to_string(),
            "connect",
            &connection_id,
            &change,
        )),
        Err(e) => {
            tracing::warn!(%connection_id, error = %e, "connect rejected");
            let _ = send(&mut ws_tx, &error_reply("", &e)).await;
            None
        }
    };

    if let Some(welcome) = welcome
        && send(&mut ws_tx, &welcome).await
    {
        loop {
            tokio::select! {
                // Incoming message from client
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let response =
                                handle_text_message(text.as_str(), &state, &connection_id, &identity).await;
                            if !send(&mut ws_tx, &response).await {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(e)) => {
                            tracing::debug!(%connection_id, error = %e, "ws read failed");
                            break;
                        }
                        _ => {}
                    }
                }
                // Notification or history batch from the hub
                message = outbound.recv() => {
                    let Some(message) = message else {
                        // Session replaced or closed by the hub.
                        break;
                    };
                    if let Some(envelope) = WsMessage::from_outbound(&message)
                        && !send(&mut ws_tx, &envelope).await
                    {
                        break;
                    }
                }
            }
        }
    }

    state.hub.unregister(&connection_id).await;
    let _ = state
        .lifecycle
        .on_disconnect(&connection_id, &identity.user_id)
        .await;
    tracing::debug!(%connection_id, "ws connection closed");
}

/// Writes one envelope. Returns `false` once the socket is unusable.
async fn send<S>(ws_tx: &mut S, message: &WsMessage) -> bool
where
    S: Sink<Message> + Unpin,
{
    match message.to_json() {
        Some(json) => ws_tx.send(Message::text(json)).await.is_ok(),
        None => {
            tracing::error!(msg_type = ?message.msg_type, "failed to serialize ws message");
            true
        }
    }
}

fn change_response(
    id: String,
    command: &str,
    connection_id: &ConnectionId,
    change: &MembershipChange,
) -> WsMessage {
    WsMessage::new(
        id,
        WsMessageType::Response,
        serde_json::json!({
            "command": command,
            "connection_id": connection_id,
            "groups": change.groups,
            "rejected": change.rejected,
            "replayed": change.replayed,
        }),
    )
}

/// Handles a text message from the client, returning the reply.
async fn handle_text_message(
    text: &str,
    state: &AppState,
    connection_id: &ConnectionId,
    identity: &Identity,
) -> WsMessage {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return error_reply("", &HubError::InvalidRequest("malformed JSON".to_string()));
    };

    if msg.msg_type != WsMessageType::Command {
        return error_reply(
            msg.id,
            &HubError::InvalidRequest("expected a command message".to_string()),
        );
    }

    let command = match serde_json::from_value::<WsCommand>(msg.payload) {
        Ok(command) => command,
        Err(e) => {
            return error_reply(
                msg.id,
                &HubError::InvalidRequest(format!("unknown or malformed command: {e}")),
            );
        }
    };
    tracing::debug!(%connection_id, command = command.name(), "ws command");

    let lifecycle = &state.lifecycle;
    let user_id = identity.user_id.as_str();
    let result = match command {
        WsCommand::Subscribe { groups } => lifecycle
            .subscribe_more(connection_id, user_id, &groups)
            .await
            .map(|change| change_response(msg.id.clone(), "subscribe", connection_id, &change)),
        WsCommand::Unsubscribe { groups } => lifecycle
            .unsubscribe(connection_id, user_id, &groups)
            .await
            .map(|change| change_response(msg.id.clone(), "unsubscribe", connection_id, &change)),
        command @ WsCommand::ConfigureNotifications { .. } => {
            let preferences = command.into_preferences().unwrap_or_default();
            lifecycle
                .configure_notifications(user_id, preferences.clone())
                .await
                .map(|()| {
                    WsMessage::new(
                        msg.id.clone(),
                        WsMessageType::Response,
                        serde_json::json!({
                            "command": "configure_notifications",
                            "preferences": preferences,
                        }),
                    )
                })
        }
    };

    result.unwrap_or_else(|e| error_reply(msg.id, &e))
}

/// Error envelope carrying the same code a REST caller would see.
fn error_reply(id: impl Into<String>, error: &HubError) -> WsMessage {
    WsMessage::error(id, error.error_code(), error.to_string())
}
