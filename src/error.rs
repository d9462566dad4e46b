// src/error.rs

use thiserror::Error;

/// Reasons an inbound text frame could not be decoded into a `ClientMessage`.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame is not a JSON object")]
    NotAnObject,
}
