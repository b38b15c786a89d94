//! Core data types shared by the server and every client.
//!
//! Everything in this module travels on the wire, either directly inside an
//! event or as part of a [`RoomSnapshot`]. Game payloads use camelCase field
//! names because the browser client is the primary consumer.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// An opaque player identity.
///
/// The server issues it during the handshake and the client stores it. A
/// client that supplies the same id again within the reconnect grace window
/// gets its seat back. Nothing else about the player (profile, account) is
/// known to the engine.
///
/// `#[serde(transparent)]` serializes `PlayerId("ab12")` as just `"ab12"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Wraps a raw id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A short, human-typeable room code.
///
/// Codes are case-insensitive: they are normalized to upper case when
/// parsed, so `"ab12cd"` and `"AB12CD"` name the same room. Deserializing
/// goes through [`RoomCode::parse`], so a malformed code never makes it
/// into a typed event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Shortest accepted code.
    pub const MIN_LEN: usize = 4;
    /// Longest accepted code.
    pub const MAX_LEN: usize = 8;

    /// Validates and normalizes a room code.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidRoomCode`] unless the trimmed input is
    /// 4–8 ASCII letters or digits.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let trimmed = raw.trim();
        let len_ok = (Self::MIN_LEN..=Self::MAX_LEN).contains(&trimmed.len());
        if !len_ok || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ProtocolError::InvalidRoomCode(raw.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Returns the normalized (upper-case) code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomCode {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient: who should receive an event?
// ---------------------------------------------------------------------------

/// Specifies who should receive a server event.
///
/// The state machine returns `(Recipient, ServerEvent)` pairs and the room
/// actor resolves them against the sessions attached to the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Every player in the room.
    All,
    /// One specific player.
    Player(PlayerId),
    /// Everyone except the given player.
    AllExcept(PlayerId),
    /// An explicit subset (e.g. the drawer plus the players who already
    /// guessed the word).
    Only(Vec<PlayerId>),
}

impl Recipient {
    /// Returns `true` if `player` is addressed by this recipient.
    pub fn includes(&self, player: &PlayerId) -> bool {
        match self {
            Self::All => true,
            Self::Player(p) => p == player,
            Self::AllExcept(p) => p != player,
            Self::Only(list) => list.contains(player),
        }
    }
}

// ---------------------------------------------------------------------------
// Room configuration
// ---------------------------------------------------------------------------

/// The phase of a room's turn state machine.
///
/// ```text
/// waiting → choosing → drawing → roundEnd → { choosing | gameEnd }
///    ↑                                                  │
///    └──────────────────── play again ──────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Waiting,
    Choosing,
    Drawing,
    RoundEnd,
    GameEnd,
}

impl Phase {
    /// Returns `true` while a game is running (a drawer rotation exists).
    pub fn is_in_game(&self) -> bool {
        matches!(self, Self::Choosing | Self::Drawing | Self::RoundEnd)
    }

    /// Returns `true` in the phases that count time down.
    pub fn is_timed(&self) -> bool {
        self.is_in_game()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Waiting => "waiting",
            Self::Choosing => "choosing",
            Self::Drawing => "drawing",
            Self::RoundEnd => "roundEnd",
            Self::GameEnd => "gameEnd",
        };
        f.write_str(name)
    }
}

/// Whether a room shows up in public listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

/// Host-controlled room settings.
///
/// Every field has a default so clients may send a partial object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomSettings {
    /// Number of full drawer rotations before the game ends.
    pub max_rounds: u32,
    /// Seconds each drawer gets.
    pub draw_time: u32,
    /// Seat limit, spectators included.
    pub max_players: usize,
    pub visibility: Visibility,
    /// Word bank theme tag, e.g. `"general"` or `"animals"`.
    pub theme: String,
    /// Word bank language, e.g. `"en"`.
    pub language: String,
}

impl RoomSettings {
    pub const ROUNDS: std::ops::RangeInclusive<u32> = 1..=10;
    pub const DRAW_TIME: std::ops::RangeInclusive<u32> = 30..=240;
    pub const PLAYERS: std::ops::RangeInclusive<usize> = 2..=12;

    /// Checks every field against its allowed range.
    ///
    /// Returns a human-readable reason on failure so it can go straight
    /// into a validation error.
    pub fn check(&self) -> Result<(), String> {
        if !Self::ROUNDS.contains(&self.max_rounds) {
            return Err(format!("maxRounds must be within {:?}", Self::ROUNDS));
        }
        if !Self::DRAW_TIME.contains(&self.draw_time) {
            return Err(format!("drawTime must be within {:?}", Self::DRAW_TIME));
        }
        if !Self::PLAYERS.contains(&self.max_players) {
            return Err(format!("maxPlayers must be within {:?}", Self::PLAYERS));
        }
        if self.theme.trim().is_empty() || self.language.trim().is_empty() {
            return Err("theme and language must not be empty".into());
        }
        Ok(())
    }
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            draw_time: 80,
            max_players: 8,
            visibility: Visibility::Private,
            theme: "general".into(),
            language: "en".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Canvas and chat
// ---------------------------------------------------------------------------

/// A point on the shared canvas, in client canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Brush,
    Eraser,
}

/// One drawing stroke.
///
/// Strokes carry no player id: the relay only accepts them from the current
/// drawer, so authorship is implied by the turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawStroke {
    pub points: Vec<Point>,
    pub color: String,
    pub size: f32,
    #[serde(default)]
    pub tool: Tool,
}

/// A chat line as stored in the room's append-only chat log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    /// `None` for system messages.
    pub player_id: Option<PlayerId>,
    pub player_name: String,
    pub text: String,
    pub is_correct: bool,
    pub is_close: bool,
    pub is_system: bool,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Client-side signals attached to a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSignals {
    /// The text was pasted from the clipboard instead of typed.
    pub pasted: bool,
    /// The client detected a userscript / script-injection tool.
    pub userscript: bool,
}

// ---------------------------------------------------------------------------
// Players and snapshots
// ---------------------------------------------------------------------------

/// The public view of a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    pub round_score: u32,
    pub avatar_color: String,
    pub is_host: bool,
    pub is_drawing: bool,
    pub has_guessed: bool,
    pub is_connected: bool,
    pub is_spectator: bool,
    pub is_muted: bool,
}

/// Full state of a room as seen by one player.
///
/// Sent as `room:sync` on join and reconnect. The secret word only appears
/// in `word` for the drawer and for players who already guessed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub code: RoomCode,
    /// The player this snapshot was rendered for.
    pub you: PlayerId,
    pub phase: Phase,
    pub round: u32,
    pub settings: RoomSettings,
    pub time_left: u32,
    pub drawer: Option<PlayerId>,
    pub masked_word: String,
    pub word: Option<String>,
    /// Word choices, only for the drawer during `choosing`.
    pub word_choices: Vec<String>,
    pub players: Vec<PlayerView>,
    pub strokes: Vec<DrawStroke>,
    pub chat: Vec<ChatMessage>,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
}

/// A line of the per-turn score table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreLine {
    pub player_id: PlayerId,
    pub name: String,
    pub score: u32,
    pub round_score: u32,
}

/// A ranked entry of the standings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    pub rank: usize,
    pub player_id: PlayerId,
    pub name: String,
    pub score: u32,
}

/// Why a drawing turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TurnEndReason {
    TimeUp,
    AllGuessed,
    DrawerLeft,
}

// ---------------------------------------------------------------------------
// Trust and moderation
// ---------------------------------------------------------------------------

/// A named piece of anti-cheat evidence.
///
/// Bans always carry their tags so a contestation can be adjudicated from
/// them. Soft tags are rate-based (noisy, not proof of intent); hard tags
/// are direct evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceTag {
    SpamModerate,
    SpamIntense,
    DuplicateMessages,
    InhumanLatency,
    PasteAbuse,
    InjectionCharacters,
    InstantGuesses,
    UserscriptDetected,
}

impl EvidenceTag {
    /// Hard evidence: direct signals rather than rate heuristics.
    pub fn is_hard(&self) -> bool {
        matches!(
            self,
            Self::InjectionCharacters | Self::InstantGuesses | Self::UserscriptDetected
        )
    }
}

impl fmt::Display for EvidenceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SpamModerate => "SPAM_MODERATE",
            Self::SpamIntense => "SPAM_INTENSE",
            Self::DuplicateMessages => "DUPLICATE_MESSAGES",
            Self::InhumanLatency => "INHUMAN_LATENCY",
            Self::PasteAbuse => "PASTE_ABUSE",
            Self::InjectionCharacters => "INJECTION_CHARACTERS",
            Self::InstantGuesses => "INSTANT_GUESSES",
            Self::UserscriptDetected => "USERSCRIPT_DETECTED",
        };
        f.write_str(name)
    }
}

/// Broadcast payload of `player:banned`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BanNotice {
    pub player_id: PlayerId,
    pub player_name: String,
    pub reason: String,
    pub evidence: BTreeSet<EvidenceTag>,
    /// Milliseconds since the Unix epoch; `None` for permanent bans.
    pub expires_at: Option<i64>,
    pub appealable: bool,
}

/// Outcome of a contestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AppealVerdict {
    /// The ban is lifted.
    Overturned,
    /// The ban stands.
    Upheld,
    /// No automated evidence to judge; left for a human moderator.
    Referred,
}

// ---------------------------------------------------------------------------
// Errors on the wire
// ---------------------------------------------------------------------------

/// Category of a rejected intent, so clients can present accurate feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Capacity,
    Phase,
    Permission,
    Trust,
    Internal,
}

/// Payload of the `error` event: the structured `success = false` result
/// of a rejected intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentError {
    pub success: bool,
    pub kind: ErrorKind,
    pub error: String,
    /// Event name of the rejected intent, when known.
    pub intent: Option<String>,
}

impl IntentError {
    pub fn new(kind: ErrorKind, error: impl Into<String>, intent: Option<&str>) -> Self {
        Self {
            success: false,
            kind,
            error: error.into(),
            intent: intent.map(str::to_string),
        }
    }
}
