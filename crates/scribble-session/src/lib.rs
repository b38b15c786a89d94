//! Connection management for Scribble.
//!
//! This crate owns the link between a transport connection and a player:
//!
//! 1. **Identity**: the server issues an opaque [`PlayerId`] on first
//!    contact. The client stores it and offers it again on reconnect.
//! 2. **Connection state**: connected, disconnected (seat held for a
//!    grace window) or expired ([`SessionState`]).
//! 3. **Room binding**: which room a session currently sits in, so a
//!    resumed session can be reattached and an expired one can leave.
//!
//! ```text
//! Room Layer (above)     ← reattach / leave driven by session state
//!     ↕
//! Session Layer (this)   ← player identity and connection state
//!     ↕
//! Protocol Layer (below) ← PlayerId, RoomCode
//! ```
//!
//! [`PlayerId`]: scribble_protocol::PlayerId

mod error;
mod manager;
mod session;

pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{Session, SessionConfig, SessionState};
