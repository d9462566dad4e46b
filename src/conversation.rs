// src/conversation.rs

use crate::models::{ChatMessage, User};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info};

/// Maximum number of messages a conversation keeps; older ones are evicted first.
pub const MAX_HISTORY_SIZE: usize = 100;

/// A chat room: its live participants and a bounded history of recent messages.
#[derive(Debug)]
pub struct Conversation {
    pub id: String,
    pub messages: VecDeque<ChatMessage>,
    pub participants: HashMap<String, User>,
}

impl Conversation {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            messages: VecDeque::with_capacity(MAX_HISTORY_SIZE),
            participants: HashMap::new(),
        }
    }
}

/// Owns every conversation; a conversation lives only while it has participants.
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: HashMap<String, Conversation>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the conversation, creating an empty one for an unseen id.
    pub fn ensure(&mut self, conversation_id: &str) -> &mut Conversation {
        self.conversations
            .entry(conversation_id.to_string())
            .or_insert_with(|| {
                info!(conversation_id, "conversation created");
                Conversation::new(conversation_id)
            })
    }

    pub fn get(&self, conversation_id: &str) -> Option<&Conversation> {
        self.conversations.get(conversation_id)
    }

    pub fn add_participant(&mut self, conversation_id: &str, user: User) {
        self.ensure(conversation_id)
            .participants
            .insert(user.id.clone(), user);
    }

    /// Removes the participant and drops the conversation once nobody is left.
    /// Returns `true` when the conversation was pruned.
    pub fn remove_participant(&mut self, conversation_id: &str, user_id: &str) -> bool {
        let Some(conversation) = self.conversations.get_mut(conversation_id) else {
            return false;
        };
        conversation.participants.remove(user_id);

        if conversation.participants.is_empty() {
            self.conversations.remove(conversation_id);
            info!(conversation_id, "conversation is empty, removing it");
            return true;
        }
        false
    }

    /// Appends to the bounded history. The message is silently dropped if the
    /// conversation no longer exists; returns whether it was stored.
    pub fn append_message(&mut self, conversation_id: &str, message: ChatMessage) -> bool {
        let Some(conversation) = self.conversations.get_mut(conversation_id) else {
            debug!(conversation_id, "conversation gone, dropping message");
            return false;
        };
        conversation.messages.push_back(message);
        while conversation.messages.len() > MAX_HISTORY_SIZE {
            conversation.messages.pop_front();
        }
        true
    }

    /// Current history, oldest first. The first fetch of an empty conversation
    /// seeds and keeps a welcome message so later fetches see the same one.
    pub fn history(&mut self, conversation_id: &str) -> Vec<ChatMessage> {
        let Some(conversation) = self.conversations.get_mut(conversation_id) else {
            return Vec::new();
        };
        if conversation.messages.is_empty() {
            conversation
                .messages
                .push_back(ChatMessage::welcome(conversation_id));
        }
        conversation.messages.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conversation> {
        self.conversations.values()
    }
}
