//! Operator surface of a running server.
//!
//! [`Admin`] is what an external admin dashboard reads and drives: room
//! and session counters, the ban list, player reports, the audit trail and
//! server-wide announcements. It carries no transport of its own.

use std::sync::Arc;

use serde::Serialize;

use scribble_protocol::{RoomCode, ServerEvent};
use scribble_room::{
    AuditEntry, BanEntry, NewBan, RegistryStats, Report, ReportStatus, RoomHandle, RoomInfo,
};

use crate::ScribbleError;
use crate::server::ServerState;

/// Point-in-time counters across the whole server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStats {
    pub sessions: usize,
    pub connected_sessions: usize,
    pub uptime_secs: u64,
    #[serde(flatten)]
    pub registry: RegistryStats,
}

/// Cheap-clone handle to the operator surface.
#[derive(Clone)]
pub struct Admin {
    state: Arc<ServerState>,
}

impl Admin {
    pub(crate) fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    pub async fn stats(&self) -> ServerStats {
        let (sessions, connected_sessions) = {
            let sessions = self.state.sessions.lock().await;
            (sessions.len(), sessions.connected_count())
        };
        let registry = scribble_room::stats_of(self.handles().await).await;
        ServerStats {
            sessions,
            connected_sessions,
            uptime_secs: self.state.started.elapsed().as_secs(),
            registry,
        }
    }

    /// Every live room, oldest first.
    pub async fn rooms(&self) -> Vec<RoomInfo> {
        scribble_room::room_infos(self.handles().await).await
    }

    /// Public rooms still in their lobby.
    pub async fn open_rooms(&self) -> Vec<RoomInfo> {
        scribble_room::open_rooms(self.handles().await).await
    }

    /// Live room handles; the registry lock is not held past return.
    async fn handles(&self) -> Vec<RoomHandle> {
        self.state.rooms.lock().await.handles()
    }

    pub fn bans(&self) -> Vec<BanEntry> {
        self.state.moderation.bans()
    }

    /// Records a ban. It applies from the player's next create or join.
    pub fn ban(&self, new: NewBan) -> BanEntry {
        let entry = self.state.moderation.ban(new);
        tracing::info!(player_id = %entry.player_id, ban = %entry.id, "admin ban");
        entry
    }

    pub fn lift_ban(&self, ban_id: &str) -> Result<BanEntry, ScribbleError> {
        Ok(self.state.moderation.lift(ban_id)?)
    }

    pub fn reports(&self) -> Vec<Report> {
        self.state.moderation.reports()
    }

    pub fn set_report_status(
        &self,
        report_id: &str,
        status: ReportStatus,
    ) -> Result<Report, ScribbleError> {
        Ok(self.state.moderation.set_report_status(report_id, status)?)
    }

    pub fn audit_log(&self) -> Vec<AuditEntry> {
        self.state.moderation.audit_log()
    }

    /// Tells every attached player that maintenance is under way.
    pub async fn maintenance(&self, message: &str) {
        tracing::info!(message, "maintenance announced");
        self.announce(ServerEvent::Maintenance {
            message: message.to_string(),
        })
        .await;
    }

    /// Tells every attached player that the server is going down.
    pub async fn shutdown(&self, message: &str) {
        tracing::info!(message, "shutdown announced");
        self.announce(ServerEvent::Shutdown {
            message: message.to_string(),
        })
        .await;
    }

    async fn announce(&self, event: ServerEvent) {
        scribble_room::broadcast(self.handles().await, event).await;
    }

    /// Closes a room. Its players get `room:closed` and are unseated.
    pub async fn close_room(&self, code: &str, reason: &str) -> Result<(), ScribbleError> {
        let code = RoomCode::parse(code)?;
        let handle = self.state.rooms.lock().await.remove_room(&code)?;
        scribble_room::close_room(&handle, reason).await;
        Ok(())
    }
}
