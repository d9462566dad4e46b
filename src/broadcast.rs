// src/broadcast.rs

use crate::{models::ServerMessage, registry::ConnectionRegistry};
use tracing::{debug, warn};

/// Sends `message` to every open connection in the conversation except `exclude_user_id`.
/// A failed delivery is logged and skipped; the peer stays registered.
/// Returns the number of successful deliveries.
pub fn broadcast(
    registry: &ConnectionRegistry,
    conversation_id: &str,
    message: &ServerMessage,
    exclude_user_id: Option<&str>,
) -> usize {
    let mut delivered = 0;

    for (key, connection) in registry.iter() {
        if key.conversation_id != conversation_id {
            continue;
        }
        if exclude_user_id.is_some_and(|exclude| key.user_id == exclude) {
            continue;
        }
        if !connection.is_open() {
            debug!(user_id = %key.user_id, conversation_id, "skipping closed connection");
            continue;
        }
        match connection.send(message.clone()) {
            Ok(()) => delivered += 1,
            Err(e) => warn!(user_id = %key.user_id, conversation_id, error = %e, "failed to deliver message"),
        }
    }

    delivered
}
