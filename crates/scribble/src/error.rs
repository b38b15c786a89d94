//! Unified error type for the Scribble server.

use scribble_protocol::{ErrorKind, IntentError, ProtocolError};
use scribble_room::{ModerationError, RoomError};
use scribble_session::SessionError;

use crate::transport::TransportError;

/// Top-level error that wraps every layer's error.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ScribbleError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (already connected, expired).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A rejected room operation or intent.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A ban, report or appeal operation failed.
    #[error(transparent)]
    Moderation(#[from] ModerationError),

    /// Bad environment or config file.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ScribbleError {
    /// The wire category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Room(err) => err.kind(),
            Self::Protocol(ProtocolError::Encode(_)) => ErrorKind::Internal,
            Self::Protocol(_) | Self::Session(SessionError::AlreadyConnected(_)) => {
                ErrorKind::Validation
            }
            Self::Moderation(_) => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        }
    }

    /// The structured `success = false` result for the client.
    pub fn to_intent_error(&self, intent: Option<&str>) -> IntentError {
        match self {
            Self::Room(err) => err.to_intent_error(intent),
            other => IntentError::new(other.kind(), other.to_string(), intent),
        }
    }
}

#[cfg(test)]
mod tests {
    use scribble_protocol::{PlayerId, RoomCode};

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let scribble_err: ScribbleError = err.into();
        assert!(matches!(scribble_err, ScribbleError::Transport(_)));
        assert_eq!(scribble_err.to_string(), "connection closed: gone");
    }

    #[test]
    fn test_from_room_error_keeps_kind() {
        let code = RoomCode::parse("AB12CD").unwrap();
        let err: ScribbleError = RoomError::RoomFull(code).into();
        assert_eq!(err.kind(), ErrorKind::Capacity);
        let wire = err.to_intent_error(Some("room:join"));
        assert!(!wire.success);
        assert_eq!(wire.intent.as_deref(), Some("room:join"));
    }

    #[test]
    fn test_invalid_room_code_is_validation() {
        let err: ScribbleError = ProtocolError::InvalidRoomCode("x!".into()).into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_no_active_ban_is_not_found() {
        let err: ScribbleError = ModerationError::NoActiveBan(PlayerId::new("p1")).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_intent_error(None).error, "player p1 has no active ban");
    }

    #[test]
    fn test_config_error_is_internal() {
        let err = ScribbleError::Config("bad".into());
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.to_string(), "configuration error: bad");
    }
}
