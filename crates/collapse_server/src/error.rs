//! Server error types.

use collapse_core::error::GameError;
use thiserror::Error;

/// Errors that stop the server or a connection.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Listener or socket IO failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket handshake or framing failed.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The match could not be created.
    #[error(transparent)]
    Game(#[from] GameError),

    /// The session task panicked or was cancelled.
    #[error("Session task failed: {0}")]
    Session(#[from] tokio::task::JoinError),
}
