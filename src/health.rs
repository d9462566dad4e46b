// src/health.rs

use crate::state::{ChatRelay, ChatState};
use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A read-only snapshot of the relay's counters.
#[derive(Serialize, Debug)]
pub struct StatusReport {
    pub status: &'static str,
    pub active_connections: usize,
    pub active_conversations: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversations: Option<Vec<ConversationStatus>>,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct ConversationStatus {
    pub id: String,
    pub participants: Vec<String>,
    pub message_count: usize,
}

impl StatusReport {
    pub fn collect(relay: &ChatRelay, detailed: bool) -> Self {
        let conversations = detailed.then(|| {
            let mut conversations: Vec<ConversationStatus> = relay
                .conversations()
                .iter()
                .map(|conversation| {
                    let mut participants: Vec<String> = conversation
                        .participants
                        .values()
                        .map(|user| user.display_name.clone())
                        .collect();
                    participants.sort();
                    ConversationStatus {
                        id: conversation.id.clone(),
                        participants,
                        message_count: conversation.messages.len(),
                    }
                })
                .collect();
            conversations.sort_by(|a, b| a.id.cmp(&b.id));
            conversations
        });

        Self {
            status: "OK",
            active_connections: relay.connections().len(),
            active_conversations: relay.conversations().len(),
            timestamp: Utc::now(),
            conversations,
        }
    }
}

/// `GET /health`
pub async fn health_handler(State(state): State<ChatState>) -> Json<StatusReport> {
    Json(StatusReport::collect(&*state.lock().await, false))
}

/// `GET /health/detailed`
pub async fn detailed_health_handler(State(state): State<ChatState>) -> Json<StatusReport> {
    Json(StatusReport::collect(&*state.lock().await, true))
}
