// src/registry.rs

use crate::models::{ServerMessage, User};
use std::collections::HashMap;
use tokio::sync::mpsc::{self, error::SendError};

/// The outbound half of a client's socket. A writer task drains the other end.
pub type ClientSender = mpsc::UnboundedSender<ServerMessage>;

/// Identifies one live connection: a user bound to a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub user_id: String,
    pub conversation_id: String,
}

impl ConnectionKey {
    pub fn new(user_id: &str, conversation_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            conversation_id: conversation_id.to_string(),
        }
    }
}

/// Represents a connected client, holding their identity and the sender part of their socket.
#[derive(Debug)]
pub struct Connection {
    pub user: User,
    pub sender: ClientSender,
}

impl Connection {
    /// Whether the socket's writer is still accepting messages.
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    pub fn send(&self, message: ServerMessage) -> Result<(), SendError<ServerMessage>> {
        self.sender.send(message)
    }
}

/// Every live socket, keyed by (user, conversation).
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionKey, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the connection, replacing any previous entry under the same key.
    pub fn register(&mut self, user: User, conversation_id: &str, sender: ClientSender) {
        let key = ConnectionKey::new(&user.id, conversation_id);
        self.connections.insert(key, Connection { user, sender });
    }

    pub fn unregister(&mut self, user_id: &str, conversation_id: &str) -> Option<Connection> {
        self.connections
            .remove(&ConnectionKey::new(user_id, conversation_id))
    }

    pub fn get(&self, user_id: &str, conversation_id: &str) -> Option<&Connection> {
        self.connections
            .get(&ConnectionKey::new(user_id, conversation_id))
    }

    pub fn contains(&self, user_id: &str, conversation_id: &str) -> bool {
        self.get(user_id, conversation_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConnectionKey, &Connection)> {
        self.connections.iter()
    }
}
