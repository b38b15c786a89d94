//! Wire protocol for Scribble.
//!
//! This crate defines the "language" that clients and the game server speak:
//!
//! - **Types** ([`PlayerId`], [`RoomCode`], [`RoomSnapshot`], [`DrawStroke`],
//!   ...): the shared data model.
//! - **Events** ([`ClientIntent`], [`ServerEvent`], [`SystemMessage`],
//!   [`Envelope`]): the closed set of messages on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how envelopes become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer knows nothing about connections, rooms or rules.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Session / Room
//! ```

mod codec;
mod error;
mod events;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{ClientIntent, Envelope, Payload, ServerEvent, SystemMessage};
pub use types::{
    AppealVerdict, BanNotice, ChatMessage, ClientSignals, DrawStroke, ErrorKind, EvidenceTag,
    IntentError, Phase, PlayerId, PlayerView, Point, Recipient, RoomCode, RoomSettings,
    RoomSnapshot, ScoreLine, Standing, Tool, TurnEndReason, Visibility,
};
