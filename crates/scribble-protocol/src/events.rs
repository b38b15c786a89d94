//! The event contract between clients and the server.
//!
//! Intents (client → server) and events (server → client) are closed sets of
//! tagged variants. The event names (`"room:join"`, `"game:hint"`, ...) are
//! part of the compatibility surface, so each variant carries an explicit
//! `#[serde(rename)]`.
//!
//! `#[serde(tag = "event", content = "data")]` produces adjacently tagged
//! JSON:
//!
//! ```text
//! { "event": "room:join", "data": { "code": "AB12CD", "playerName": "Bob" } }
//! { "event": "game:start" }
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{
    AppealVerdict, BanNotice, ChatMessage, ClientSignals, DrawStroke, EvidenceTag,
    IntentError, PlayerId, RoomCode, RoomSettings, RoomSnapshot, ScoreLine, Standing,
    TurnEndReason,
};

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Everything a client can ask the server to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum ClientIntent {
    #[serde(rename = "room:create")]
    CreateRoom {
        player_name: String,
        #[serde(default)]
        settings: RoomSettings,
        /// Optional custom code (4–8 letters or digits).
        #[serde(default)]
        code: Option<String>,
    },

    #[serde(rename = "room:join")]
    JoinRoom {
        /// Raw code as typed; validated server-side so a typo is a
        /// validation error rather than a decode failure.
        code: String,
        player_name: String,
        #[serde(default)]
        spectate: bool,
    },

    #[serde(rename = "room:leave")]
    LeaveRoom,

    #[serde(rename = "room:settings")]
    UpdateSettings(RoomSettings),

    #[serde(rename = "game:start")]
    StartGame,

    #[serde(rename = "game:select_word")]
    SelectWord { word: String },

    #[serde(rename = "game:next_round")]
    NextRound,

    #[serde(rename = "game:play_again")]
    PlayAgain,

    #[serde(rename = "chat:message")]
    Chat {
        text: String,
        #[serde(default)]
        signals: ClientSignals,
    },

    #[serde(rename = "draw:stroke")]
    Stroke(DrawStroke),

    #[serde(rename = "draw:clear")]
    ClearCanvas,

    #[serde(rename = "draw:undo")]
    Undo,

    #[serde(rename = "player:kick")]
    Kick { target: PlayerId },

    #[serde(rename = "player:ban")]
    Ban {
        target: PlayerId,
        #[serde(default)]
        reason: Option<String>,
    },

    #[serde(rename = "player:report")]
    Report {
        target: PlayerId,
        reason: String,
        #[serde(default)]
        details: String,
    },

    /// Contest the caller's active ban.
    #[serde(rename = "player:appeal")]
    Appeal,
}

impl ClientIntent {
    /// The wire name of this intent, used in logs and error results.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "room:create",
            Self::JoinRoom { .. } => "room:join",
            Self::LeaveRoom => "room:leave",
            Self::UpdateSettings(_) => "room:settings",
            Self::StartGame => "game:start",
            Self::SelectWord { .. } => "game:select_word",
            Self::NextRound => "game:next_round",
            Self::PlayAgain => "game:play_again",
            Self::Chat { .. } => "chat:message",
            Self::Stroke(_) => "draw:stroke",
            Self::ClearCanvas => "draw:clear",
            Self::Undo => "draw:undo",
            Self::Kick { .. } => "player:kick",
            Self::Ban { .. } => "player:ban",
            Self::Report { .. } => "player:report",
            Self::Appeal => "player:appeal",
        }
    }
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Everything the server can tell a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Full state snapshot, sent on join, reconnect and membership changes.
    #[serde(rename = "room:sync")]
    Sync(Box<RoomSnapshot>),

    #[serde(rename = "room:closed")]
    Closed { reason: String },

    #[serde(rename = "host:changed")]
    HostChanged { host_id: PlayerId, host_name: String },

    #[serde(rename = "game:starting")]
    GameStarting { max_rounds: u32, players: Vec<PlayerId> },

    /// Sent to everyone when a drawer starts choosing; only the drawer's
    /// copy carries the candidate words.
    #[serde(rename = "game:choose_word")]
    ChooseWord {
        drawer_id: PlayerId,
        drawer_name: String,
        words: Vec<String>,
        timeout: u32,
    },

    /// The secret word, for the drawer (and for players who guessed it).
    #[serde(rename = "game:word")]
    Word { word: String },

    #[serde(rename = "game:turn_start")]
    TurnStart {
        drawer_id: PlayerId,
        drawer_name: String,
        masked_word: String,
        draw_time: u32,
        round: u32,
    },

    #[serde(rename = "game:time_update")]
    TimeUpdate { time_left: u32 },

    #[serde(rename = "game:hint")]
    Hint {
        masked_word: String,
        index: usize,
        letter: char,
    },

    #[serde(rename = "game:correct_guess")]
    CorrectGuess {
        player_id: PlayerId,
        player_name: String,
        points: u32,
        drawer_points: u32,
    },

    #[serde(rename = "game:turn_end")]
    TurnEnd {
        /// `None` when the drawer left before choosing.
        word: Option<String>,
        reason: TurnEndReason,
        scores: Vec<ScoreLine>,
    },

    #[serde(rename = "game:round_end")]
    RoundEnd { round: u32, standings: Vec<Standing> },

    #[serde(rename = "game:ended")]
    Ended { standings: Vec<Standing> },

    #[serde(rename = "chat:message")]
    Chat(ChatMessage),

    #[serde(rename = "draw:stroke")]
    Stroke(DrawStroke),

    #[serde(rename = "draw:clear")]
    ClearCanvas,

    #[serde(rename = "draw:undo")]
    Undo,

    #[serde(rename = "player:kicked")]
    Kicked { player_id: PlayerId, player_name: String },

    #[serde(rename = "player:banned")]
    Banned(BanNotice),

    #[serde(rename = "player:appeal_result")]
    AppealResult {
        verdict: AppealVerdict,
        rationale: String,
        evidence: Vec<EvidenceTag>,
    },

    #[serde(rename = "maintenance:active")]
    Maintenance { message: String },

    #[serde(rename = "server:shutdown")]
    Shutdown { message: String },

    #[serde(rename = "error")]
    Error(IntentError),
}

impl ServerEvent {
    /// The wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sync(_) => "room:sync",
            Self::Closed { .. } => "room:closed",
            Self::HostChanged { .. } => "host:changed",
            Self::GameStarting { .. } => "game:starting",
            Self::ChooseWord { .. } => "game:choose_word",
            Self::Word { .. } => "game:word",
            Self::TurnStart { .. } => "game:turn_start",
            Self::TimeUpdate { .. } => "game:time_update",
            Self::Hint { .. } => "game:hint",
            Self::CorrectGuess { .. } => "game:correct_guess",
            Self::TurnEnd { .. } => "game:turn_end",
            Self::RoundEnd { .. } => "game:round_end",
            Self::Ended { .. } => "game:ended",
            Self::Chat(_) => "chat:message",
            Self::Stroke(_) => "draw:stroke",
            Self::ClearCanvas => "draw:clear",
            Self::Undo => "draw:undo",
            Self::Kicked { .. } => "player:kicked",
            Self::Banned(_) => "player:banned",
            Self::AppealResult { .. } => "player:appeal_result",
            Self::Maintenance { .. } => "maintenance:active",
            Self::Shutdown { .. } => "server:shutdown",
            Self::Error(_) => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// Connection-level messages
// ---------------------------------------------------------------------------

/// Connection plumbing that is not part of the game: handshake, keep-alive
/// and graceful disconnect.
///
/// `#[serde(tag = "type")]` makes this internally tagged:
/// `{ "type": "Heartbeat", "client_time": 123 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    /// Client → Server: first frame on every connection. `player_id` is
    /// the id stored from a previous session, if any.
    Handshake {
        version: u32,
        #[serde(default)]
        player_id: Option<PlayerId>,
    },

    /// Server → Client: the (possibly new) player id, whether an existing
    /// session was resumed, and the room it is still seated in.
    HandshakeAck {
        player_id: PlayerId,
        resumed: bool,
        room: Option<RoomCode>,
        server_time: u64,
    },

    Heartbeat { client_time: u64 },

    HeartbeatAck { client_time: u64, server_time: u64 },

    Disconnect { reason: String },
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The content of an envelope.
///
/// `{ "type": "Intent", "data": { "event": "game:start" } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    System(SystemMessage),
    /// Client → Server only.
    Intent(ClientIntent),
    /// Server → Client only.
    Event(ServerEvent),
}

/// The top-level frame. Every WebSocket message is one envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-direction sequence number. A client may resend an envelope with
    /// the same `seq`; the server processes it once. `0` means unsequenced.
    pub seq: u64,

    /// Milliseconds since the sender's reference point (server start for
    /// server frames).
    pub timestamp: u64,

    pub payload: Payload,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorKind, Point, Tool};

    #[test]
    fn test_client_intent_uses_event_names() {
        let json = serde_json::to_value(ClientIntent::JoinRoom {
            code: "AB12CD".into(),
            player_name: "Bob".into(),
            spectate: false,
        })
        .unwrap();
        assert_eq!(json["event"], "room:join");
        assert_eq!(json["data"]["playerName"], "Bob");
    }

    #[test]
    fn test_client_intent_unit_variant_without_data() {
        let intent: ClientIntent = serde_json::from_str(r#"{"event":"draw:undo"}"#).unwrap();
        assert_eq!(intent, ClientIntent::Undo);
    }

    #[test]
    fn test_client_intent_chat_signals_default() {
        let intent: ClientIntent =
            serde_json::from_str(r#"{"event":"chat:message","data":{"text":"hi"}}"#).unwrap();
        assert_eq!(
            intent,
            ClientIntent::Chat {
                text: "hi".into(),
                signals: ClientSignals::default(),
            }
        );
    }

    #[test]
    fn test_client_intent_stroke_payload_is_the_stroke() {
        let raw = r##"{"event":"draw:stroke","data":{"points":[{"x":1.0,"y":2.0}],"color":"#000","size":4.0}}"##;
        let intent: ClientIntent = serde_json::from_str(raw).unwrap();
        match intent {
            ClientIntent::Stroke(stroke) => {
                assert_eq!(stroke.points, vec![Point { x: 1.0, y: 2.0 }]);
                assert_eq!(stroke.tool, Tool::Brush);
            }
            other => panic!("expected stroke, got {other:?}"),
        }
    }

    #[test]
    fn test_intent_name_matches_serialized_tag() {
        let intents = [
            ClientIntent::LeaveRoom,
            ClientIntent::StartGame,
            ClientIntent::NextRound,
            ClientIntent::PlayAgain,
            ClientIntent::ClearCanvas,
            ClientIntent::Appeal,
            ClientIntent::SelectWord { word: "cat".into() },
        ];
        for intent in intents {
            let json = serde_json::to_value(&intent).unwrap();
            assert_eq!(json["event"], intent.name());
        }
    }

    #[test]
    fn test_server_event_error_shape() {
        let event = ServerEvent::Error(IntentError::new(
            ErrorKind::Capacity,
            "room AB12CD is full",
            Some("room:join"),
        ));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["data"]["success"], false);
        assert_eq!(json["data"]["kind"], "capacity");
        assert_eq!(json["data"]["intent"], "room:join");
    }

    #[test]
    fn test_server_event_name_matches_serialized_tag() {
        let events = [
            ServerEvent::TimeUpdate { time_left: 3 },
            ServerEvent::ClearCanvas,
            ServerEvent::Closed { reason: "empty".into() },
            ServerEvent::Maintenance { message: "soon".into() },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["event"], event.name());
        }
    }

    #[test]
    fn test_handshake_player_id_optional() {
        let msg: SystemMessage =
            serde_json::from_str(r#"{"type":"Handshake","version":1}"#).unwrap();
        assert_eq!(
            msg,
            SystemMessage::Handshake {
                version: 1,
                player_id: None
            }
        );
    }
}
