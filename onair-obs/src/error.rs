use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObsError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("Not connected to OBS")]
    NotConnected,

    #[error("Connection to OBS closed before a response arrived")]
    ConnectionClosed,

    #[error("Request {request_type} failed (code {code}): {}", comment.as_deref().unwrap_or("no comment"))]
    RequestFailed {
        request_type: String,
        code: i64,
        comment: Option<String>,
    },

    #[error("Source {source_name} not found in scene {scene}: {comment}")]
    SceneItemNotFound {
        scene: String,
        source_name: String,
        comment: String,
    },

    #[error("Request {request_type} timed out after {after:?}")]
    Timeout {
        request_type: String,
        after: Duration,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ObsError>;
