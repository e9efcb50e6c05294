use crate::client::ConnectionState;
use std::time::Duration;
use tokio_tungstenite::tungstenite::{self, http::header::InvalidHeaderValue};

/// Transport-level failures. All of them end the session.
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error("failed to connect to realtime endpoint: {0}")]
    Connect(#[source] tungstenite::Error),
    #[error("realtime handshake did not complete within {0:?}")]
    ConnectTimeout(Duration),
    #[error("invalid request header: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),
    #[error("session is not open (state: {0:?})")]
    NotOpen(ConnectionState),
    #[error(
        "connection closed by server{}",
        .0.as_deref().map(|r| format!(": {r}")).unwrap_or_default()
    )]
    Closed(Option<String>),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("failed to encode client event: {0}")]
    Encode(#[from] serde_json::Error),
}
