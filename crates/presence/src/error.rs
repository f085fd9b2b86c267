use thiserror::Error;

#[derive(Debug, Error)]
pub enum PresenceError {
    #[error("Discord is not running (no IPC socket found)")]
    DiscordNotRunning,

    #[error("IPC I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IPC payload error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("handshake rejected: {0}")]
    Handshake(String),

    #[error("Discord returned an error: {0}")]
    Rejected(String),

    #[error("unexpected IPC frame: {0}")]
    Protocol(String),

    #[error("not connected to Discord")]
    NotConnected,
}

pub type Result<T> = std::result::Result<T, PresenceError>;
