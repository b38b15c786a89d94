//! Session types: the server's record of one player's connection.

use std::time::Instant;

use scribble_protocol::{PlayerId, RoomCode};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behaviour.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long (in seconds) a disconnected player keeps their seat.
    ///
    /// Default: 30 seconds. `0` expires a session on the next sweep.
    pub reconnect_grace_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_grace_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The connection state of a session.
///
/// ```text
///   Connected ──(disconnect)──→ Disconnected ──(grace elapsed)──→ Expired
///       ↑                            │
///       └──────────(resume)──────────┘
/// ```
#[derive(Debug, Clone)]
pub enum SessionState {
    Connected,

    /// The transport dropped at `since`. The seat is held until the grace
    /// window closes.
    Disconnected { since: Instant },

    /// Terminal. The player is treated as having left; the session is
    /// removed by the next cleanup.
    Expired,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One player's session.
#[derive(Debug, Clone)]
pub struct Session {
    pub player_id: PlayerId,

    pub state: SessionState,

    /// The room this player currently sits in, if any.
    pub room: Option<RoomCode>,
}

impl Session {
    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected)
    }
}
