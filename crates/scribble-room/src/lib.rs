//! Rooms for Scribble.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns a
//! [`GameRoom`] state machine and its phase timer. Everything that mutates
//! a room goes through its command channel, so intents and ticks for one
//! room are strictly serialized while rooms run in parallel.
//!
//! # Key types
//!
//! - [`GameRoom`]: the turn/phase state machine (pure, synchronous)
//! - [`RoomRegistry`]: creates/destroys rooms, routes by code
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`Moderation`]: the process-wide ban list, report store and audit log
//! - [`GameConfig`]: timing, scoring and anti-cheat tuning

mod config;
mod error;
mod game;
pub mod moderation;
mod registry;
mod room;
mod timer;

pub use config::{GameConfig, TimingConfig};
pub use error::RoomError;
pub use game::{Departure, GameRoom, Player, RoomDeps, RoomInfo};
pub use moderation::{
    AppealDecision, AppealPolicy, AuditEntry, BanEntry, IssuedBy, Moderation, ModerationError,
    NewBan, NewReport, Report, ReportStatus, adjudicate,
};
pub use registry::{
    RegistryStats, RoomRegistry, broadcast, close_room, open_rooms, room_infos, stats_of,
};
pub use room::{PlayerSender, RoomHandle, RoomOutbound};
pub use timer::PhaseTimer;
