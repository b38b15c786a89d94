//! Error types for the session layer.

use scribble_protocol::PlayerId;

/// Errors that can occur during session management.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given player.
    #[error("session not found for player {0}")]
    NotFound(PlayerId),

    /// The grace window elapsed before the player came back.
    #[error("session expired for player {0}")]
    SessionExpired(PlayerId),

    /// The player already has a live connection. One connection per
    /// player id at a time.
    #[error("player {0} already has an active session")]
    AlreadyConnected(PlayerId),
}
