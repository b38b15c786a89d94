//! Room actor: an isolated Tokio task that owns one [`GameRoom`].
//!
//! Each room runs in its own task and talks to the outside world through
//! an mpsc channel. Commands and phase-timer ticks are handled one at a
//! time in the same `select!` loop, so the state machine never sees two
//! mutations at once and rooms never block each other.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use scribble_protocol::{ClientIntent, PlayerId, RoomCode, RoomSettings, RoomSnapshot, ServerEvent};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::game::{Departure, GameRoom, RoomDeps, RoomInfo};
use crate::timer::PhaseTimer;
use crate::RoomError;

/// What a room sends down a player's connection.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomOutbound {
    Event(ServerEvent),
    /// The player no longer sits in `code`: left, kicked, banned, expired
    /// or the room closed. Nothing else follows from this room.
    Detached { code: RoomCode, reason: String },
}

/// Channel sender for delivering outbound messages to a player.
pub type PlayerSender = mpsc::UnboundedSender<RoomOutbound>;

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

/// Commands sent to a room actor through its channel.
///
/// The `reply` in a variant is a oneshot channel: the caller sends the
/// command and waits for the result on it.
pub(crate) enum RoomCommand {
    /// Seat a new player.
    Join {
        player_id: PlayerId,
        name: String,
        spectate: bool,
        sender: PlayerSender,
        reply: Reply<()>,
    },

    /// A seated player is back on a new connection.
    Reattach {
        player_id: PlayerId,
        sender: PlayerSender,
        reply: Reply<()>,
    },

    /// A seated player's connection dropped. The seat is kept.
    Detach { player_id: PlayerId, reply: Reply<()> },

    /// Give up the seat.
    Leave { player_id: PlayerId, reply: Reply<()> },

    Intent {
        player_id: PlayerId,
        intent: ClientIntent,
        reply: Reply<()>,
    },

    Info { reply: oneshot::Sender<RoomInfo> },

    Snapshot {
        player_id: PlayerId,
        reply: Reply<RoomSnapshot>,
    },

    /// Deliver a server-wide event to everyone attached.
    Announce { event: ServerEvent },

    /// Close the room and detach everyone.
    Close { reason: String },
}

/// Handle to a running room actor.
///
/// Cheap to clone: it is an `mpsc::Sender` wrapper. Every method fails
/// with [`RoomError::Unavailable`] once the actor has stopped.
#[derive(Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// `true` once the actor task has exited.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// A handle whose actor never answers while the receiver is alive.
    #[cfg(test)]
    pub(crate) fn stalled(code: RoomCode) -> (Self, mpsc::Receiver<RoomCommand>) {
        let (sender, rx) = mpsc::channel(8);
        (Self { code, sender }, rx)
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.code.clone())
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(build(reply_tx))
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    pub async fn join(
        &self,
        player_id: PlayerId,
        name: String,
        spectate: bool,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Join {
            player_id,
            name,
            spectate,
            sender,
            reply,
        })
        .await?
    }

    pub async fn reattach(&self, player_id: PlayerId, sender: PlayerSender) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Reattach {
            player_id,
            sender,
            reply,
        })
        .await?
    }

    pub async fn detach(&self, player_id: PlayerId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Detach { player_id, reply })
            .await?
    }

    pub async fn leave(&self, player_id: PlayerId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Leave { player_id, reply })
            .await?
    }

    pub async fn intent(&self, player_id: PlayerId, intent: ClientIntent) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Intent {
            player_id,
            intent,
            reply,
        })
        .await?
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::Info { reply }).await
    }

    pub async fn snapshot(&self, player_id: PlayerId) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { player_id, reply })
            .await?
    }

    /// Fire-and-forget broadcast.
    pub async fn announce(&self, event: ServerEvent) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Announce { event })
            .await
            .map_err(|_| self.unavailable())
    }

    /// Tells the room to shut down.
    pub async fn close(&self, reason: impl Into<String>) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Close {
                reason: reason.into(),
            })
            .await
            .map_err(|_| self.unavailable())
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct RoomActor {
    code: RoomCode,
    game: GameRoom,
    clock: RoomClock,
    /// Outbound channels of the attached players.
    senders: HashMap<PlayerId, PlayerSender>,
}

/// Epoch milliseconds that advance with the runtime's monotonic clock.
#[derive(Debug, Clone, Copy)]
struct RoomClock {
    epoch_ms: u64,
    origin: Instant,
}

impl RoomClock {
    fn start() -> Self {
        Self {
            epoch_ms: u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default(),
            origin: Instant::now(),
        }
    }

    fn now_ms(&self) -> u64 {
        let elapsed = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.epoch_ms.saturating_add(elapsed)
    }
}

impl RoomActor {
    async fn run(mut self, mut receiver: mpsc::Receiver<RoomCommand>, mut timer: PhaseTimer) {
        tracing::info!(room = %self.code, "room actor started");

        loop {
            tokio::select! {
                command = receiver.recv() => {
                    let Some(command) = command else {
                        tracing::debug!(room = %self.code, "all handles dropped");
                        break;
                    };
                    if !self.handle(command) {
                        break;
                    }
                }
                elapsed = timer.wait() => {
                    let now = self.clock.now_ms();
                    for _ in 0..elapsed {
                        self.game.tick(now);
                    }
                }
            }

            self.flush();
            timer.set_running(self.game.needs_clock());

            if self.game.is_empty() {
                tracing::info!(room = %self.code, "room is empty, closing");
                break;
            }
        }

        tracing::info!(room = %self.code, "room actor stopped");
    }

    /// Applies one command. Returns `false` when the actor should stop.
    ///
    /// Events a command produces are flushed before its reply is sent, so
    /// a caller that got the reply finds them already queued.
    fn handle(&mut self, command: RoomCommand) -> bool {
        match command {
            RoomCommand::Join {
                player_id,
                name,
                spectate,
                sender,
                reply,
            } => {
                // Attach first so the join's own sync reaches the player.
                let previous = self.senders.insert(player_id.clone(), sender);
                let result = self.game.add_player(player_id.clone(), &name, spectate, self.clock.now_ms());
                if result.is_err() {
                    match previous {
                        Some(previous) => self.senders.insert(player_id.clone(), previous),
                        None => self.senders.remove(&player_id),
                    };
                }
                self.flush();
                let _ = reply.send(result);
            }
            RoomCommand::Reattach {
                player_id,
                sender,
                reply,
            } => {
                let previous = self.senders.insert(player_id.clone(), sender);
                let result = self.game.reconnect(&player_id);
                if result.is_err() {
                    self.senders.remove(&player_id);
                } else if let Some(stale) = previous {
                    let _ = stale.send(RoomOutbound::Detached {
                        code: self.code.clone(),
                        reason: "replaced by a new connection".into(),
                    });
                }
                self.flush();
                let _ = reply.send(result);
            }
            RoomCommand::Detach { player_id, reply } => {
                self.senders.remove(&player_id);
                let result = self.game.disconnect(&player_id, self.clock.now_ms());
                self.flush();
                let _ = reply.send(result);
            }
            RoomCommand::Leave { player_id, reply } => {
                let result = self.game.remove_player(&player_id, "left", self.clock.now_ms());
                self.flush();
                let _ = reply.send(result);
            }
            RoomCommand::Intent {
                player_id,
                intent,
                reply,
            } => {
                let name = intent.name();
                let result = self.game.handle_intent(&player_id, intent, self.clock.now_ms());
                if let Err(err) = &result {
                    tracing::debug!(room = %self.code, %player_id, intent = name, %err, "intent rejected");
                }
                self.flush();
                let _ = reply.send(result);
            }
            RoomCommand::Info { reply } => {
                let _ = reply.send(self.game.info());
            }
            RoomCommand::Snapshot { player_id, reply } => {
                let result = match self.game.player(&player_id) {
                    Some(_) => Ok(self.game.snapshot_for(&player_id)),
                    None => Err(RoomError::PlayerNotFound(player_id)),
                };
                let _ = reply.send(result);
            }
            RoomCommand::Announce { event } => {
                for sender in self.senders.values() {
                    let _ = sender.send(RoomOutbound::Event(event.clone()));
                }
            }
            RoomCommand::Close { reason } => {
                tracing::info!(room = %self.code, %reason, "room closing");
                self.flush();
                for (_, sender) in self.senders.drain() {
                    let _ = sender.send(RoomOutbound::Event(ServerEvent::Closed {
                        reason: reason.clone(),
                    }));
                    let _ = sender.send(RoomOutbound::Detached {
                        code: self.code.clone(),
                        reason: reason.clone(),
                    });
                }
                return false;
            }
        }
        true
    }

    /// Delivers queued events, then lets go of departed players.
    fn flush(&mut self) {
        for (to, event) in self.game.drain_outbox() {
            for (player_id, sender) in &self.senders {
                if to.includes(player_id) {
                    // A closed receiver means the connection task is gone;
                    // its Detach command is already on the way.
                    let _ = sender.send(RoomOutbound::Event(event.clone()));
                }
            }
        }

        for Departure { player_id, reason } in self.game.drain_departures() {
            if let Some(sender) = self.senders.remove(&player_id) {
                let _ = sender.send(RoomOutbound::Detached {
                    code: self.code.clone(),
                    reason,
                });
            }
        }
    }
}

/// Spawns a new room actor task and returns a handle to it.
///
/// The command channel is bounded by `command_channel_size`: when it
/// fills up, callers wait.
pub(crate) fn spawn_room(code: RoomCode, settings: RoomSettings, deps: RoomDeps) -> RoomHandle {
    let config = deps.config.clone();
    let (tx, rx) = mpsc::channel(config.command_channel_size.max(1));
    let rng = config
        .rng_seed
        .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
    let timer = PhaseTimer::new(
        Duration::from_millis(config.timing.tick_ms),
        Duration::from_millis(config.timing.initial_jitter_ms),
    );

    let clock = RoomClock::start();
    let actor = RoomActor {
        code: code.clone(),
        game: GameRoom::new(code.clone(), settings, deps, rng, clock.now_ms()),
        clock,
        senders: HashMap::new(),
    };
    tokio::spawn(actor.run(rx, timer));

    RoomHandle { code, sender: tx }
}
