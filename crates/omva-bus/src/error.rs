use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("malformed bus message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid payload for '{name}': {reason}")]
    Payload { name: String, reason: String },

    #[error("outgoing queue is full, dropped '{0}'")]
    Backpressure(String),

    #[error("bus connection closed")]
    Closed,
}
