// src/models.rs

use crate::error::FrameError;
use chrono::{DateTime, Utc};
use rand::{Rng, distr::Alphanumeric};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// An ephemeral identity minted for every new connection.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub display_name: String,
}

impl User {
    /// Mints a fresh user; ids are never reused across reconnects.
    pub fn mint() -> Self {
        let id = Uuid::new_v4().to_string();
        let display_name = format!("User_{}", &id[..8]);
        Self { id, display_name }
    }
}

/// A chat message as stored in a conversation's history and sent to peers.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub message_id: String,
    #[serde(rename = "message")]
    pub content: String,
    pub sender_id: String,
    pub sender_name: String,
    pub created_at: DateTime<Utc>,
    pub attachments: Vec<Value>,
    pub conversation_id: String,
    pub is_read: bool,
}

impl ChatMessage {
    pub fn new(conversation_id: &str, sender: &User, content: String, attachments: Vec<Value>) -> Self {
        Self {
            message_id: new_message_id(),
            content,
            sender_id: sender.id.clone(),
            sender_name: sender.display_name.clone(),
            created_at: Utc::now(),
            attachments,
            conversation_id: conversation_id.to_string(),
            is_read: false,
        }
    }

    /// The message seeded into an empty conversation on its first history fetch.
    pub fn welcome(conversation_id: &str) -> Self {
        let system = User {
            id: "system".to_string(),
            display_name: "System".to_string(),
        };
        Self::new(
            conversation_id,
            &system,
            "Welcome to the conversation!".to_string(),
            Vec::new(),
        )
    }
}

/// Server-assigned message id: millisecond timestamp plus a random suffix.
pub fn new_message_id() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    format!("msg_{}_{}", Utc::now().timestamp_millis(), suffix)
}

/// A message sent from a client to the server.
/// Decoded from incoming JSON text with [`ClientMessage::parse`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    ChatMessage {
        /// `None` when the `message` field is absent or not a string.
        content: Option<String>,
        attachments: Vec<Value>,
        temp_id: Option<String>,
    },
    ReadReceipt,
    TypingSignal {
        /// Passed through untouched, whatever JSON the client sent.
        is_typing: Option<Value>,
    },
    Unknown {
        kind: String,
    },
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut fields) = value else {
            return Err(FrameError::NotAnObject);
        };

        // Only a missing key counts as absent; an explicit `null` is kept.
        let kind = match fields.remove("type") {
            Some(Value::String(kind)) => kind,
            Some(other) => return Ok(ClientMessage::Unknown { kind: other.to_string() }),
            None => {
                return Ok(ClientMessage::Unknown {
                    kind: "undefined".to_string(),
                });
            }
        };

        let message = match kind.as_str() {
            "message" => ClientMessage::ChatMessage {
                content: match fields.remove("message") {
                    Some(Value::String(content)) => Some(content),
                    _ => None,
                },
                attachments: match fields.remove("attachments") {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                },
                temp_id: match fields.remove("temp_id") {
                    Some(Value::String(id)) if !id.is_empty() => Some(id),
                    _ => None,
                },
            },
            "read" => ClientMessage::ReadReceipt,
            "typing" => ClientMessage::TypingSignal {
                is_typing: fields.remove("is_typing"),
            },
            _ => ClientMessage::Unknown { kind },
        };
        Ok(message)
    }
}

/// A message sent from the server to a client.
/// Serialized into JSON text for sending.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectionEstablished {
        user: User,
        conversation_id: String,
        user_id: String,
    },
    History {
        conversation_id: String,
        messages: Vec<ChatMessage>,
    },
    MessageAck {
        temp_id: String,
        message_id: String,
        conversation_id: String,
        status: String,
    },
    Message(ChatMessage),
    Read {
        reader_id: String,
        reader_name: String,
        conversation_id: String,
        timestamp: DateTime<Utc>,
    },
    Typing {
        user_id: String,
        user_name: String,
        conversation_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_typing: Option<Value>,
    },
    Error {
        error: String,
    },
}

impl ServerMessage {
    pub fn error(error: impl Into<String>) -> Self {
        ServerMessage::Error { error: error.into() }
    }
}
