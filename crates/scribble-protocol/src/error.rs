//! Error types for the protocol layer.
//!
//! Each crate in Scribble defines its own error enum. A `ProtocolError`
//! always means the problem is in parsing or (de)serialization, never in
//! networking or game rules.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, an unknown event name, missing
    /// required fields or a truncated frame.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A room code that does not match the 4–8 alphanumeric format.
    #[error("invalid room code {0:?}: expected 4-8 letters or digits")]
    InvalidRoomCode(String),

    /// The message parsed but violates protocol rules (e.g. an intent
    /// sent before the handshake).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
