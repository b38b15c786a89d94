//! Server configuration.
//!
//! Defaults suit local development. [`ServerConfig::from_env`] overrides
//! them from the environment (and an optional `.env` file):
//!
//! | Variable | Meaning |
//! |---|---|
//! | `SCRIBBLE_BIND` | listen address, e.g. `0.0.0.0:8080` |
//! | `SCRIBBLE_RECONNECT_GRACE_SECS` | seat hold after a drop |
//! | `SCRIBBLE_IDLE_TIMEOUT_SECS` | close connections silent this long |
//! | `SCRIBBLE_GAME_CONFIG` | path to a JSON [`GameConfig`] |

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use scribble_room::GameConfig;
use scribble_session::SessionConfig;

use crate::ScribbleError;

pub const ENV_BIND: &str = "SCRIBBLE_BIND";
pub const ENV_RECONNECT_GRACE: &str = "SCRIBBLE_RECONNECT_GRACE_SECS";
pub const ENV_IDLE_TIMEOUT: &str = "SCRIBBLE_IDLE_TIMEOUT_SECS";
pub const ENV_GAME_CONFIG: &str = "SCRIBBLE_GAME_CONFIG";

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub session: SessionConfig,
    pub game: GameConfig,
    /// A connection that sends nothing (not even a heartbeat) for this
    /// long is closed.
    pub idle_timeout: Duration,
    /// Time a new connection has to send its handshake.
    pub handshake_timeout: Duration,
    /// Period of the session sweeper.
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            session: SessionConfig::default(),
            game: GameConfig::default(),
            idle_timeout: Duration::from_secs(60),
            handshake_timeout: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(1),
        }
    }
}

impl ServerConfig {
    /// Loads `.env` (if present), then applies the `SCRIBBLE_*` variables
    /// over the defaults.
    ///
    /// # Errors
    /// [`ScribbleError::Config`] for unparsable values or an unreadable
    /// game config file.
    pub fn from_env() -> Result<Self, ScribbleError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable
    /// source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ScribbleError> {
        let mut config = Self::default();
        if let Some(bind) = lookup(ENV_BIND) {
            config.bind = bind;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, ENV_RECONNECT_GRACE)? {
            config.session.reconnect_grace_secs = secs;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, ENV_IDLE_TIMEOUT)? {
            config.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(path) = lookup(ENV_GAME_CONFIG) {
            config.game = load_game_config(Path::new(&path))?;
        }
        Ok(config)
    }
}

/// Reads a [`GameConfig`] from a JSON file. Missing fields keep their
/// defaults.
pub fn load_game_config(path: &Path) -> Result<GameConfig, ScribbleError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ScribbleError::Config(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| ScribbleError::Config(format!("{}: {e}", path.display())))
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ScribbleError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| ScribbleError::Config(format!("{key}={raw:?}: {e}")))
        })
        .transpose()
}
