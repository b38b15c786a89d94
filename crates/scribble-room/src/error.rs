//! Error types for the room layer.

use scribble_protocol::{ErrorKind, EvidenceTag, IntentError, PlayerId, RoomCode};

/// Why an intent or a room operation was rejected.
///
/// Every variant maps onto a wire [`ErrorKind`] through [`RoomError::kind`],
/// so the client can tell a typo from a full room from a ban.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// Bad input: a name, a code, a setting, a chat line.
    #[error("{0}")]
    Validation(String),

    #[error("room {0} not found")]
    NotFound(RoomCode),

    #[error("player {0} is not in this room")]
    PlayerNotFound(PlayerId),

    #[error("no player named {0:?} in this room")]
    UnknownPlayerName(String),

    #[error("room code {0} is already in use")]
    CodeTaken(RoomCode),

    #[error("room {0} is full")]
    RoomFull(RoomCode),

    #[error("player {0} is already in room {1}")]
    AlreadyInRoom(PlayerId, RoomCode),

    /// The action is not valid in the current phase (or, for strokes, not
    /// valid for a non-drawer).
    #[error("{0}")]
    InvalidPhase(String),

    /// Host-only action, or an action against a protected target.
    #[error("{0}")]
    NotPermitted(String),

    /// The player has an active ban.
    #[error("player {0} is banned")]
    Banned(PlayerId),

    /// Anti-cheat excluded the player.
    #[error("temporarily banned for suspicious activity: {}", join_tags(.0))]
    Trust(Vec<EvidenceTag>),

    /// The room's actor has stopped (the room closed meanwhile).
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}

impl RoomError {
    /// The wire category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::CodeTaken(_) | Self::AlreadyInRoom(..) => {
                ErrorKind::Validation
            }
            Self::NotFound(_) | Self::PlayerNotFound(_) | Self::UnknownPlayerName(_) => {
                ErrorKind::NotFound
            }
            Self::RoomFull(_) => ErrorKind::Capacity,
            Self::InvalidPhase(_) => ErrorKind::Phase,
            Self::NotPermitted(_) => ErrorKind::Permission,
            Self::Banned(_) | Self::Trust(_) => ErrorKind::Trust,
            Self::Unavailable(_) => ErrorKind::Internal,
        }
    }

    /// The structured `success = false` result for the client.
    pub fn to_intent_error(&self, intent: Option<&str>) -> IntentError {
        IntentError::new(self.kind(), self.to_string(), intent)
    }
}

fn join_tags(tags: &[EvidenceTag]) -> String {
    tags.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_maps_each_category() {
        let code = RoomCode::parse("AB12CD").unwrap();
        assert_eq!(RoomError::RoomFull(code.clone()).kind(), ErrorKind::Capacity);
        assert_eq!(RoomError::NotFound(code).kind(), ErrorKind::NotFound);
        assert_eq!(RoomError::InvalidPhase("x".into()).kind(), ErrorKind::Phase);
        assert_eq!(RoomError::NotPermitted("x".into()).kind(), ErrorKind::Permission);
        assert_eq!(RoomError::Trust(vec![]).kind(), ErrorKind::Trust);
    }

    #[test]
    fn test_trust_message_lists_tags() {
        let err = RoomError::Trust(vec![EvidenceTag::SpamIntense, EvidenceTag::PasteAbuse]);
        assert_eq!(
            err.to_string(),
            "temporarily banned for suspicious activity: SPAM_INTENSE, PASTE_ABUSE"
        );
        let wire = err.to_intent_error(Some("chat:message"));
        assert!(!wire.success);
        assert_eq!(wire.intent.as_deref(), Some("chat:message"));
    }
}
