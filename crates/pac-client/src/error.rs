use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("scheduler returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("bearer token is not a valid header value")]
    InvalidToken,
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("{what} timed out after {secs}s")]
    Timeout { what: &'static str, secs: u64 },
}

impl ClientError {
    /// Short label for status lines.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::Http(_) => "transport",
            ClientError::Status { .. } => "status",
            ClientError::Decode(_) => "decode",
            ClientError::InvalidUrl { .. } => "url",
            ClientError::InvalidToken => "token",
            ClientError::WebSocket(_) => "websocket",
            ClientError::Timeout { .. } => "timeout",
        }
    }
}
