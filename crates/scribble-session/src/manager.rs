//! The session manager: tracks every known player session.
//!
//! # Concurrency note
//!
//! `SessionManager` is a plain `HashMap` with no locking of its own. The
//! server wraps it in a single `tokio::sync::Mutex`; every operation here
//! is synchronous and short.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;
use scribble_protocol::{PlayerId, RoomCode};

use crate::{Session, SessionConfig, SessionError, SessionState};

/// Manages all player sessions.
///
/// ## Lifecycle
///
/// ```text
/// handshake() ──→ create() / resume() ──→ disconnect() ──→ resume()
///                                              │
///                                              ▼
///                                        expire_stale()
///                                              │
///                                              ▼
///                                   [Expired] ──→ cleanup_expired()
/// ```
pub struct SessionManager {
    sessions: HashMap<PlayerId, Session>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            config,
        }
    }

    fn grace(&self) -> Duration {
        Duration::from_secs(self.config.reconnect_grace_secs)
    }

    /// Issues a fresh player id and a connected session for it.
    pub fn create(&mut self) -> &Session {
        let mut player_id = generate_player_id();
        while self.sessions.contains_key(&player_id) {
            player_id = generate_player_id();
        }

        tracing::info!(%player_id, "session created");
        self.sessions.entry(player_id.clone()).or_insert(Session {
            player_id,
            state: SessionState::Connected,
            room: None,
        })
    }

    /// Resumes a disconnected session inside its grace window.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] for an id this server never issued (or
    ///   already cleaned up).
    /// - [`SessionError::SessionExpired`] if the grace window closed. The
    ///   session stays disconnected with its room so the next
    ///   [`expire_stale`](Self::expire_stale) still reports the seat.
    /// - [`SessionError::AlreadyConnected`] if the id has a live connection.
    pub fn resume(&mut self, player_id: &PlayerId) -> Result<&Session, SessionError> {
        let grace = self.grace();
        let session = self
            .sessions
            .get_mut(player_id)
            .ok_or_else(|| SessionError::NotFound(player_id.clone()))?;

        match &session.state {
            SessionState::Disconnected { since } => {
                if since.elapsed() >= grace {
                    return Err(SessionError::SessionExpired(player_id.clone()));
                }
                session.state = SessionState::Connected;
                tracing::info!(%player_id, room = ?session.room, "session resumed");
                Ok(session)
            }
            SessionState::Connected => Err(SessionError::AlreadyConnected(player_id.clone())),
            SessionState::Expired => Err(SessionError::SessionExpired(player_id.clone())),
        }
    }

    /// The handshake path: resumes `requested` when possible, otherwise
    /// issues a fresh id. Returns the session and whether it was resumed.
    ///
    /// # Errors
    /// Only [`SessionError::AlreadyConnected`]: unknown and expired ids
    /// silently get a new identity.
    pub fn resume_or_create(
        &mut self,
        requested: Option<&PlayerId>,
    ) -> Result<(&Session, bool), SessionError> {
        let resumable = match requested {
            Some(id) => match self.resume(id) {
                Ok(_) => Some(id.clone()),
                Err(err @ SessionError::AlreadyConnected(_)) => return Err(err),
                Err(_) => None,
            },
            None => None,
        };

        match resumable {
            Some(id) => {
                let session = self
                    .sessions
                    .get(&id)
                    .ok_or(SessionError::NotFound(id))?;
                Ok((session, true))
            }
            None => Ok((self.create(), false)),
        }
    }

    /// Marks a player as disconnected and starts the grace window.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if the player has no session.
    pub fn disconnect(&mut self, player_id: &PlayerId) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(player_id)
            .ok_or_else(|| SessionError::NotFound(player_id.clone()))?;

        session.state = SessionState::Disconnected {
            since: Instant::now(),
        };
        tracing::info!(%player_id, "player disconnected, grace period started");
        Ok(())
    }

    /// Records the room a player sits in.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if the player has no session.
    pub fn bind_room(&mut self, player_id: &PlayerId, code: RoomCode) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(player_id)
            .ok_or_else(|| SessionError::NotFound(player_id.clone()))?;
        session.room = Some(code);
        Ok(())
    }

    /// Forgets the room binding, returning the previous room.
    pub fn clear_room(&mut self, player_id: &PlayerId) -> Option<RoomCode> {
        self.sessions
            .get_mut(player_id)
            .and_then(|session| session.room.take())
    }

    /// The room a player sits in, if any.
    pub fn room_of(&self, player_id: &PlayerId) -> Option<&RoomCode> {
        self.sessions.get(player_id).and_then(|s| s.room.as_ref())
    }

    /// Expires every session whose grace window has closed.
    ///
    /// Returns the expired players with the room they were bound to, so the
    /// caller can apply leave semantics there.
    pub fn expire_stale(&mut self) -> Vec<(PlayerId, Option<RoomCode>)> {
        let grace = self.grace();
        let mut expired = Vec::new();

        for session in self.sessions.values_mut() {
            if let SessionState::Disconnected { since } = &session.state {
                if since.elapsed() >= grace {
                    session.state = SessionState::Expired;
                    tracing::info!(
                        player_id = %session.player_id,
                        "session expired (grace period elapsed)"
                    );
                    expired.push((session.player_id.clone(), session.room.take()));
                }
            }
        }

        expired
    }

    /// Removes expired sessions. Returns how many were dropped.
    pub fn cleanup_expired(&mut self) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| !matches!(session.state, SessionState::Expired));
        before - self.sessions.len()
    }

    pub fn get(&self, player_id: &PlayerId) -> Option<&Session> {
        self.sessions.get(player_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Number of sessions with a live connection.
    pub fn connected_count(&self) -> usize {
        self.sessions.values().filter(|s| s.is_connected()).count()
    }
}

/// 128 random bits as 32 lowercase hex chars.
fn generate_player_id() -> PlayerId {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    PlayerId::new(bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with_instant_expiry() -> SessionManager {
        SessionManager::new(SessionConfig {
            reconnect_grace_secs: 0,
        })
    }

    fn manager_with_long_grace() -> SessionManager {
        SessionManager::new(SessionConfig {
            reconnect_grace_secs: 3600,
        })
    }

    fn code(raw: &str) -> RoomCode {
        RoomCode::parse(raw).unwrap()
    }

    #[test]
    fn test_create_issues_connected_session_with_opaque_id() {
        let mut mgr = manager_with_long_grace();

        let session = mgr.create();

        assert!(session.is_connected());
        assert_eq!(session.player_id.as_str().len(), 32);
        assert!(session.room.is_none());
    }

    #[test]
    fn test_create_ids_are_unique() {
        let mut mgr = manager_with_long_grace();
        let a = mgr.create().player_id.clone();
        let b = mgr.create().player_id.clone();
        assert_ne!(a, b);
        assert_eq!(mgr.len(), 2);
    }

    #[test]
    fn test_disconnect_unknown_player_returns_not_found() {
        let mut mgr = manager_with_long_grace();
        let ghost = PlayerId::new("ghost");
        assert_eq!(mgr.disconnect(&ghost), Err(SessionError::NotFound(ghost)));
    }

    #[test]
    fn test_resume_within_grace_restores_connection_and_room() {
        let mut mgr = manager_with_long_grace();
        let id = mgr.create().player_id.clone();
        mgr.bind_room(&id, code("AB12CD")).unwrap();
        mgr.disconnect(&id).unwrap();

        let session = mgr.resume(&id).expect("should resume");

        assert!(session.is_connected());
        assert_eq!(session.room, Some(code("AB12CD")));
    }

    #[test]
    fn test_resume_connected_player_returns_already_connected() {
        let mut mgr = manager_with_long_grace();
        let id = mgr.create().player_id.clone();
        assert_eq!(
            mgr.resume(&id).map(|_| ()),
            Err(SessionError::AlreadyConnected(id))
        );
    }

    #[test]
    fn test_resume_after_grace_returns_expired() {
        let mut mgr = manager_with_instant_expiry();
        let id = mgr.create().player_id.clone();
        mgr.disconnect(&id).unwrap();

        let result = mgr.resume(&id).map(|_| ());

        assert_eq!(result, Err(SessionError::SessionExpired(id.clone())));
        assert!(matches!(
            mgr.get(&id).unwrap().state,
            SessionState::Disconnected { .. }
        ));
    }

    #[test]
    fn test_late_resume_still_reports_seat_to_expire_stale() {
        let mut mgr = manager_with_instant_expiry();
        let id = mgr.create().player_id.clone();
        mgr.bind_room(&id, code("AB12CD")).unwrap();
        mgr.disconnect(&id).unwrap();

        let (session, resumed) = mgr.resume_or_create(Some(&id)).unwrap();
        assert!(!resumed);
        assert_ne!(session.player_id, id);

        assert_eq!(mgr.expire_stale(), vec![(id.clone(), Some(code("AB12CD")))]);
        assert_eq!(mgr.cleanup_expired(), 1);
        assert!(mgr.get(&id).is_none());
    }

    #[test]
    fn test_resume_or_create_unknown_id_gets_fresh_identity() {
        let mut mgr = manager_with_long_grace();
        let stale = PlayerId::new("from-a-previous-process");

        let (session, resumed) = mgr.resume_or_create(Some(&stale)).unwrap();

        assert!(!resumed);
        assert_ne!(session.player_id, stale);
    }

    #[test]
    fn test_resume_or_create_known_id_resumes() {
        let mut mgr = manager_with_long_grace();
        let id = mgr.create().player_id.clone();
        mgr.disconnect(&id).unwrap();

        let (session, resumed) = mgr.resume_or_create(Some(&id)).unwrap();

        assert!(resumed);
        assert_eq!(session.player_id, id);
    }

    #[test]
    fn test_resume_or_create_live_id_is_rejected() {
        let mut mgr = manager_with_long_grace();
        let id = mgr.create().player_id.clone();
        assert!(matches!(
            mgr.resume_or_create(Some(&id)),
            Err(SessionError::AlreadyConnected(_))
        ));
    }

    #[test]
    fn test_expire_stale_reports_bound_room() {
        let mut mgr = manager_with_instant_expiry();
        let id = mgr.create().player_id.clone();
        mgr.bind_room(&id, code("WXYZ")).unwrap();
        mgr.disconnect(&id).unwrap();

        let expired = mgr.expire_stale();

        assert_eq!(expired, vec![(id.clone(), Some(code("WXYZ")))]);
        assert!(mgr.room_of(&id).is_none());
    }

    #[test]
    fn test_expire_stale_keeps_sessions_within_grace() {
        let mut mgr = manager_with_long_grace();
        let id = mgr.create().player_id.clone();
        mgr.disconnect(&id).unwrap();

        assert!(mgr.expire_stale().is_empty());
        assert!(matches!(
            mgr.get(&id).unwrap().state,
            SessionState::Disconnected { .. }
        ));
    }

    #[test]
    fn test_cleanup_expired_removes_only_expired() {
        let mut mgr = manager_with_instant_expiry();
        let gone = mgr.create().player_id.clone();
        let live = mgr.create().player_id.clone();
        mgr.disconnect(&gone).unwrap();
        mgr.expire_stale();

        assert_eq!(mgr.cleanup_expired(), 1);
        assert!(mgr.get(&gone).is_none());
        assert!(mgr.get(&live).is_some());
        assert_eq!(mgr.connected_count(), 1);
    }

    #[test]
    fn test_clear_room_returns_previous_binding() {
        let mut mgr = manager_with_long_grace();
        let id = mgr.create().player_id.clone();
        mgr.bind_room(&id, code("ROOM1")).unwrap();
        assert_eq!(mgr.clear_room(&id), Some(code("ROOM1")));
        assert_eq!(mgr.clear_room(&id), None);
    }
}
