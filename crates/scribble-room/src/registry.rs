//! Room registry: creates, tracks and routes to room actors by code.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rand::Rng;
use scribble_engine::WordBank;
use scribble_protocol::{
    ClientIntent, Phase, PlayerId, RoomCode, RoomSettings, RoomSnapshot, ServerEvent, Visibility,
};
use serde::Serialize;

use crate::game::{RoomDeps, RoomInfo};
use crate::moderation::Moderation;
use crate::room::{PlayerSender, RoomHandle, spawn_room};
use crate::{GameConfig, RoomError};

/// Alphabet of generated codes: no `0/O` or `1/I` to misread.
const CODE_CHARS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const GENERATED_CODE_LEN: usize = 6;

/// Point-in-time counters for the admin surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub rooms: usize,
    pub players: usize,
    pub connected: usize,
    pub spectators: usize,
    /// Room count per phase name.
    pub by_phase: BTreeMap<String, usize>,
}

/// Every live room, keyed by code.
///
/// The registry only tracks rooms. Which room a player sits in is the
/// session's business; a room's own player list is the actor's. Methods
/// that talk to a room await on its actor: callers that share the
/// registry behind a lock should take a [`handle`](Self::handle) or
/// [`handles`](Self::handles), release the lock, then await (see
/// [`room_infos`], [`broadcast`], [`stats_of`], [`close_room`]).
pub struct RoomRegistry {
    rooms: HashMap<RoomCode, RoomHandle>,
    deps: RoomDeps,
}

impl RoomRegistry {
    pub fn new(config: GameConfig, words: WordBank) -> Self {
        let moderation = Moderation::new(config.appeal.clone());
        Self {
            rooms: HashMap::new(),
            deps: RoomDeps {
                config: Arc::new(config),
                words: Arc::new(words),
                moderation,
            },
        }
    }

    /// The moderation store shared by every room.
    pub fn moderation(&self) -> &Moderation {
        &self.deps.moderation
    }

    pub fn config(&self) -> &GameConfig {
        &self.deps.config
    }

    /// Creates a room and seats `host` in it.
    ///
    /// `custom_code` is used verbatim (normalized) when given; otherwise a
    /// fresh 6-character code is generated.
    ///
    /// # Errors
    /// Invalid settings, name or code, a code already in use, or an
    /// active ban on the host.
    pub async fn create_room(
        &mut self,
        host: PlayerId,
        host_name: &str,
        settings: RoomSettings,
        custom_code: Option<&str>,
        sender: PlayerSender,
    ) -> Result<RoomCode, RoomError> {
        settings.check().map_err(RoomError::Validation)?;
        if self.deps.moderation.is_banned(&host) {
            return Err(RoomError::Banned(host));
        }
        self.prune_closed();

        let code = match custom_code {
            Some(raw) => {
                let code = RoomCode::parse(raw).map_err(|e| RoomError::Validation(e.to_string()))?;
                if self.rooms.contains_key(&code) {
                    return Err(RoomError::CodeTaken(code));
                }
                code
            }
            None => self.generate_code(),
        };

        let handle = spawn_room(code.clone(), settings, self.deps.clone());
        // A failed join leaves the room empty and its actor stops by itself.
        handle
            .join(host.clone(), host_name.to_string(), false, sender)
            .await?;
        self.rooms.insert(code.clone(), handle);
        tracing::info!(room = %code, %host, rooms = self.rooms.len(), "room created");
        Ok(code)
    }

    fn generate_code(&self) -> RoomCode {
        let mut rng = rand::rng();
        loop {
            let raw: String = (0..GENERATED_CODE_LEN)
                .map(|_| char::from(CODE_CHARS[rng.random_range(0..CODE_CHARS.len())]))
                .collect();
            if let Ok(code) = RoomCode::parse(&raw) {
                if !self.rooms.contains_key(&code) {
                    return code;
                }
            }
        }
    }

    /// A handle to a live room.
    ///
    /// # Errors
    /// [`RoomError::NotFound`] for unknown codes and rooms whose actor
    /// has stopped.
    pub fn handle(&self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        self.rooms
            .get(code)
            .filter(|handle| !handle.is_closed())
            .cloned()
            .ok_or_else(|| RoomError::NotFound(code.clone()))
    }

    /// Handles of every live room.
    pub fn handles(&self) -> Vec<RoomHandle> {
        self.rooms
            .values()
            .filter(|handle| !handle.is_closed())
            .cloned()
            .collect()
    }

    pub async fn join_room(
        &self,
        code: &RoomCode,
        player: PlayerId,
        name: &str,
        spectate: bool,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        self.handle(code)?
            .join(player, name.to_string(), spectate, sender)
            .await
    }

    pub async fn leave_room(&self, code: &RoomCode, player: PlayerId) -> Result<(), RoomError> {
        self.handle(code)?.leave(player).await
    }

    pub async fn reattach(
        &self,
        code: &RoomCode,
        player: PlayerId,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        self.handle(code)?.reattach(player, sender).await
    }

    pub async fn detach(&self, code: &RoomCode, player: PlayerId) -> Result<(), RoomError> {
        self.handle(code)?.detach(player).await
    }

    /// Routes a client intent to the room the player sits in.
    pub async fn route_intent(
        &self,
        code: &RoomCode,
        player: PlayerId,
        intent: ClientIntent,
    ) -> Result<(), RoomError> {
        self.handle(code)?.intent(player, intent).await
    }

    pub async fn snapshot(&self, code: &RoomCode, player: PlayerId) -> Result<RoomSnapshot, RoomError> {
        self.handle(code)?.snapshot(player).await
    }

    pub async fn get_room_info(&self, code: &RoomCode) -> Result<RoomInfo, RoomError> {
        self.handle(code)?.info().await
    }

    /// Public rooms still waiting for players, oldest first.
    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        open_rooms(self.handles()).await
    }

    /// Every live room, oldest first.
    pub async fn list_all_rooms(&self) -> Vec<RoomInfo> {
        room_infos(self.handles()).await
    }

    /// Stops tracking a room and hands back its actor for
    /// [`close_room`].
    ///
    /// # Errors
    /// [`RoomError::NotFound`] for unknown codes.
    pub fn remove_room(&mut self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        self.rooms
            .remove(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))
    }

    /// Closes a room. Everyone in it gets `room:closed` and is detached.
    ///
    /// # Errors
    /// [`RoomError::NotFound`] for unknown codes.
    pub async fn destroy_room(&mut self, code: &RoomCode, reason: &str) -> Result<(), RoomError> {
        let handle = self.remove_room(code)?;
        close_room(&handle, reason).await;
        Ok(())
    }

    /// Sends a server-wide event to every attached player.
    pub async fn announce(&self, event: ServerEvent) {
        broadcast(self.handles(), event).await;
    }

    pub async fn stats(&self) -> RegistryStats {
        stats_of(self.handles()).await
    }

    /// Number of tracked rooms, stopped ones included until pruned.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Forgets rooms whose actor has stopped. Returns how many.
    pub fn prune_closed(&mut self) -> usize {
        let before = self.rooms.len();
        self.rooms.retain(|_, handle| !handle.is_closed());
        let pruned = before - self.rooms.len();
        if pruned > 0 {
            tracing::debug!(pruned, rooms = self.rooms.len(), "pruned closed rooms");
        }
        pruned
    }
}

// Fan-out over a snapshot of handles. These never touch the registry, so
// a caller sharing it behind a lock can drop the guard before awaiting.

/// Room info of every handle that still answers, oldest first.
pub async fn room_infos(handles: Vec<RoomHandle>) -> Vec<RoomInfo> {
    let mut infos = Vec::with_capacity(handles.len());
    for handle in handles {
        if let Ok(info) = handle.info().await {
            infos.push(info);
        }
    }
    infos.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.code.cmp(&b.code)));
    infos
}

/// Public rooms still in their lobby, oldest first.
pub async fn open_rooms(handles: Vec<RoomHandle>) -> Vec<RoomInfo> {
    room_infos(handles)
        .await
        .into_iter()
        .filter(|info| info.visibility == Visibility::Public && info.phase == Phase::Waiting)
        .collect()
}

pub async fn broadcast(handles: Vec<RoomHandle>, event: ServerEvent) {
    for handle in handles {
        let _ = handle.announce(event.clone()).await;
    }
}

pub async fn stats_of(handles: Vec<RoomHandle>) -> RegistryStats {
    let mut stats = RegistryStats::default();
    for info in room_infos(handles).await {
        stats.rooms += 1;
        stats.players += info.player_count;
        stats.connected += info.connected_count;
        stats.spectators += info.spectator_count;
        *stats.by_phase.entry(info.phase.to_string()).or_default() += 1;
    }
    stats
}

/// Tells a removed room to shut down.
pub async fn close_room(handle: &RoomHandle, reason: &str) {
    // An actor that already stopped has nobody left to notify.
    let _ = handle.close(reason).await;
    tracing::info!(room = %handle.code(), reason, "room destroyed");
}
