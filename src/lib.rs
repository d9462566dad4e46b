// src/lib.rs

pub mod broadcast;
pub mod config;
pub mod conversation;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod models;
pub mod registry;
pub mod state;
pub mod websocket;

use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;

/// Builds the application routes over the shared state.
pub fn router(state: state::ChatState) -> Router {
    Router::new()
        .route("/ws/chat", get(websocket::missing_conversation_handler))
        .route("/ws/chat/", get(websocket::missing_conversation_handler))
        .route("/ws/chat/{conversation_id}", get(websocket::websocket_handler))
        .route("/health", get(health::health_handler))
        .route("/health/detailed", get(health::detailed_health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}
