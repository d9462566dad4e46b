// src/websocket.rs

use crate::{
    dispatch::dispatch,
    models::{ServerMessage, User},
    state::ChatState,
};
use axum::{
    extract::{
        Path, Query, State, WebSocketUpgrade,
        rejection::QueryRejection,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code},
    },
    response::IntoResponse,
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use serde::Deserialize;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, error, info, warn};

const CONVERSATION_REQUIRED: &str = "Conversation ID required";

/// Query parameters accepted on the connection endpoint.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    /// Accepted but never verified.
    pub token: Option<String>,
}

/// `GET /ws/chat/{conversation_id}`
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<ChatState>,
    Path(conversation_id): Path<String>,
    query: Result<Query<ConnectQuery>, QueryRejection>,
) -> impl IntoResponse {
    // The token is never verified, so an unparseable query does not block the upgrade.
    let has_token = match query {
        Ok(Query(query)) => query.token.is_some(),
        Err(e) => {
            debug!(conversation_id = %conversation_id, error = %e, "ignoring unparseable query");
            false
        }
    };
    info!(conversation_id = %conversation_id, has_token, "new client connecting");
    ws.on_upgrade(move |socket| async move {
        if conversation_id.trim().is_empty() {
            reject_socket(socket).await;
        } else {
            handle_socket(socket, state, conversation_id).await;
        }
    })
}

/// `GET /ws/chat` without a conversation id.
pub async fn missing_conversation_handler(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(reject_socket)
}

async fn reject_socket(mut socket: WebSocket) {
    warn!("connection without conversation id, closing");
    let frame = CloseFrame {
        code: close_code::POLICY,
        reason: Utf8Bytes::from_static(CONVERSATION_REQUIRED),
    };
    if let Err(e) = socket.send(Message::Close(Some(frame))).await {
        debug!(error = %e, "failed to send close frame");
    }
}

/// Manages the lifecycle of a client: join, read until close, then leave.
async fn handle_socket(socket: WebSocket, state: ChatState, conversation_id: String) {
    let (sender, receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();

    let user = state.lock().await.join(&conversation_id, tx);

    let mut send_task = tokio::spawn(write_to_client(sender, rx));
    let mut receive_task = tokio::spawn(read_from_client(
        receiver,
        user.clone(),
        state.clone(),
        conversation_id.clone(),
    ));

    // Whichever side finishes first ends the connection.
    tokio::select! {
        _ = &mut receive_task => send_task.abort(),
        _ = &mut send_task => receive_task.abort(),
    }

    state.lock().await.leave(&user.id, &conversation_id);
    info!(user_id = %user.id, conversation_id = %conversation_id, "client disconnected");
}

/// Reads frames from a client and dispatches each one in arrival order.
async fn read_from_client(
    mut receiver: SplitStream<WebSocket>,
    user: User,
    state: ChatState,
    conversation_id: String,
) {
    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let mut relay = state.lock().await;
                dispatch(&mut relay, &user, &conversation_id, text.as_str());
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(user_id = %user.id, conversation_id = %conversation_id, error = %e, "socket error");
                break;
            }
        }
    }
}

/// Drains the connection's outbound queue onto the socket as JSON text frames.
async fn write_to_client(
    mut sender: SplitSink<WebSocket, Message>,
    mut rx: UnboundedReceiver<ServerMessage>,
) {
    while let Some(message) = rx.recv().await {
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "failed to serialize outbound message");
                continue;
            }
        };
        if let Err(e) = sender.send(Message::Text(text.into())).await {
            debug!(error = %e, "socket closed while sending");
            break;
        }
    }
}
