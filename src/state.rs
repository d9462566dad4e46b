// src/state.rs

use crate::{
    broadcast,
    conversation::ConversationStore,
    models::{ServerMessage, User},
    registry::{ClientSender, ConnectionRegistry},
};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

/// The relay's in-memory state: live connections and the conversations they belong to.
#[derive(Debug, Default)]
pub struct ChatRelay {
    connections: ConnectionRegistry,
    conversations: ConversationStore,
}

impl ChatRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a new connection to `conversation_id` under a freshly minted user,
    /// then greets it with `connection_established` followed by the history.
    pub fn join(&mut self, conversation_id: &str, sender: ClientSender) -> User {
        let user = User::mint();
        self.conversations
            .add_participant(conversation_id, user.clone());
        self.connections
            .register(user.clone(), conversation_id, sender);
        info!(user_id = %user.id, conversation_id, "user joined conversation");

        self.send_to(
            &user.id,
            conversation_id,
            ServerMessage::ConnectionEstablished {
                user: user.clone(),
                conversation_id: conversation_id.to_string(),
                user_id: user.id.clone(),
            },
        );
        let messages = self.conversations.history(conversation_id);
        self.send_to(
            &user.id,
            conversation_id,
            ServerMessage::History {
                conversation_id: conversation_id.to_string(),
                messages,
            },
        );
        user
    }

    /// Deregisters the connection and prunes the conversation if it is now empty.
    pub fn leave(&mut self, user_id: &str, conversation_id: &str) {
        self.connections.unregister(user_id, conversation_id);
        let pruned = self
            .conversations
            .remove_participant(conversation_id, user_id);
        info!(user_id, conversation_id, pruned, "user left conversation");
    }

    /// Sends to a single connection. Returns whether it was delivered.
    pub fn send_to(&self, user_id: &str, conversation_id: &str, message: ServerMessage) -> bool {
        let Some(connection) = self.connections.get(user_id, conversation_id) else {
            return false;
        };
        match connection.send(message) {
            Ok(()) => true,
            Err(e) => {
                warn!(user_id, conversation_id, error = %e, "failed to send to client");
                false
            }
        }
    }

    pub fn broadcast(
        &self,
        conversation_id: &str,
        message: &ServerMessage,
        exclude_user_id: Option<&str>,
    ) -> usize {
        broadcast::broadcast(&self.connections, conversation_id, message, exclude_user_id)
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    pub fn conversations_mut(&mut self) -> &mut ConversationStore {
        &mut self.conversations
    }
}

/// The application's shared state, accessible from all request handlers.
/// Created once in `main.rs` and shared across all connections via Axum's state management.
/// Handlers hold the lock for the whole of their work, so no two of them interleave.
#[derive(Clone, Default)]
pub struct ChatState {
    relay: Arc<Mutex<ChatRelay>>,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self) -> MutexGuard<'_, ChatRelay> {
        self.relay.lock().await
    }
}
