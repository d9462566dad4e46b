// src/dispatch.rs

use crate::{
    models::{ChatMessage, ClientMessage, ServerMessage, User},
    state::ChatRelay,
};
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

const INVALID_FORMAT: &str = "Invalid message format";
const CONTENT_REQUIRED: &str = "Message content is required";
const CONTENT_EMPTY: &str = "Message content cannot be empty";

/// Decodes one inbound text frame from `user` and routes it by message type.
/// Protocol errors are answered with an `error` event; the connection stays open.
pub fn dispatch(relay: &mut ChatRelay, user: &User, conversation_id: &str, text: &str) {
    // The connection may have been torn down while the frame was in flight.
    if !relay.connections().contains(&user.id, conversation_id) {
        debug!(user_id = %user.id, conversation_id, "frame for departed connection ignored");
        return;
    }

    let message = match ClientMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(user_id = %user.id, conversation_id, error = %e, "malformed frame");
            reply_error(relay, user, conversation_id, INVALID_FORMAT);
            return;
        }
    };

    match message {
        ClientMessage::ChatMessage {
            content,
            attachments,
            temp_id,
        } => handle_chat_message(relay, user, conversation_id, content, attachments, temp_id),
        ClientMessage::ReadReceipt => handle_read_receipt(relay, user, conversation_id),
        ClientMessage::TypingSignal { is_typing } => {
            handle_typing(relay, user, conversation_id, is_typing)
        }
        ClientMessage::Unknown { kind } => {
            debug!(user_id = %user.id, conversation_id, kind = %kind, "unknown message type");
            reply_error(
                relay,
                user,
                conversation_id,
                format!("Unknown message type: {kind}"),
            );
        }
    }
}

/// Validates, acknowledges, stores and broadcasts a new chat message.
fn handle_chat_message(
    relay: &mut ChatRelay,
    user: &User,
    conversation_id: &str,
    content: Option<String>,
    attachments: Vec<Value>,
    temp_id: Option<String>,
) {
    let Some(content) = content else {
        reply_error(relay, user, conversation_id, CONTENT_REQUIRED);
        return;
    };
    let content = content.trim();
    if content.is_empty() {
        reply_error(relay, user, conversation_id, CONTENT_EMPTY);
        return;
    }

    let message = ChatMessage::new(conversation_id, user, content.to_string(), attachments);

    // The sender learns the server id before anyone else sees the message.
    if let Some(temp_id) = temp_id {
        relay.send_to(
            &user.id,
            conversation_id,
            ServerMessage::MessageAck {
                temp_id,
                message_id: message.message_id.clone(),
                conversation_id: conversation_id.to_string(),
                status: "sent".to_string(),
            },
        );
    }

    relay
        .conversations_mut()
        .append_message(conversation_id, message.clone());

    let message_id = message.message_id.clone();
    let delivered = relay.broadcast(
        conversation_id,
        &ServerMessage::Message(message),
        Some(&user.id),
    );
    debug!(user_id = %user.id, conversation_id, message_id = %message_id, delivered, "message broadcast");
}

fn handle_read_receipt(relay: &ChatRelay, user: &User, conversation_id: &str) {
    let receipt = ServerMessage::Read {
        reader_id: user.id.clone(),
        reader_name: user.display_name.clone(),
        conversation_id: conversation_id.to_string(),
        timestamp: Utc::now(),
    };
    relay.broadcast(conversation_id, &receipt, Some(&user.id));
}

fn handle_typing(relay: &ChatRelay, user: &User, conversation_id: &str, is_typing: Option<Value>) {
    let signal = ServerMessage::Typing {
        user_id: user.id.clone(),
        user_name: user.display_name.clone(),
        conversation_id: conversation_id.to_string(),
        is_typing,
    };
    relay.broadcast(conversation_id, &signal, Some(&user.id));
}

fn reply_error(relay: &ChatRelay, user: &User, conversation_id: &str, error: impl Into<String>) {
    relay.send_to(&user.id, conversation_id, ServerMessage::error(error));
}
