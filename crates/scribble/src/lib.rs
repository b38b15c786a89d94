//! # Scribble
//!
//! Server for a real-time drawing-and-guessing party game.
//!
//! Players meet in rooms identified by a short code. Each turn one player
//! draws a secret word while the others guess it in chat; the server owns
//! the clock, the word, the scores and the anti-cheat verdicts. Clients
//! speak JSON envelopes over a WebSocket.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scribble::prelude::*;
//!
//! # async fn start() -> Result<(), ScribbleError> {
//! let server = ScribbleServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! ## Layers
//!
//! ```text
//! transport (WebSocket frames)
//!   → scribble-protocol (Envelope, ClientIntent, ServerEvent)
//!   → scribble-session (player ids, reconnect grace)
//!   → scribble-room (room actors, turn state machine, moderation)
//!   → scribble-engine (words, masking, scoring, anti-cheat)
//! ```

mod admin;
mod config;
mod error;
mod handler;
mod server;
mod transport;

pub use admin::{Admin, ServerStats};
pub use config::{ServerConfig, load_game_config};
pub use error::ScribbleError;
pub use server::{PROTOCOL_VERSION, ScribbleServer, ScribbleServerBuilder};
pub use transport::{ConnectionId, TransportError, WebSocketConnection, WebSocketTransport};

pub mod prelude {
    pub use crate::{Admin, PROTOCOL_VERSION, ScribbleError, ScribbleServer, ServerConfig};
    pub use scribble_protocol::{
        ClientIntent, Envelope, Payload, PlayerId, RoomCode, RoomSettings, ServerEvent,
        SystemMessage,
    };
    pub use scribble_room::GameConfig;
    pub use scribble_session::SessionConfig;
}
