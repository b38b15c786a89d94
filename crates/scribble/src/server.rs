//! `ScribbleServer` builder and server loop.
//!
//! This is the entry point for running a Scribble server. It ties together
//! all the layers: transport → protocol → session → room.

use std::sync::Arc;
use std::time::{Duration, Instant};

use scribble_engine::WordBank;
use scribble_protocol::JsonCodec;
use scribble_room::{GameConfig, Moderation, RoomRegistry};
use scribble_session::{SessionConfig, SessionManager};
use tokio::sync::Mutex;

use crate::admin::Admin;
use crate::handler::handle_connection;
use crate::transport::WebSocketTransport;
use crate::{ScribbleError, ServerConfig};

/// The current protocol version. Clients must send this in their
/// handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Shared server state passed to each connection handler task.
///
/// Lock order: `sessions` before `rooms`, never the other way round.
/// Neither lock is held while waiting on the network.
pub(crate) struct ServerState {
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) rooms: Mutex<RoomRegistry>,
    pub(crate) moderation: Moderation,
    pub(crate) codec: JsonCodec,
    pub(crate) idle_timeout: Duration,
    pub(crate) handshake_timeout: Duration,
    /// Reference point of every server-side envelope timestamp.
    pub(crate) started: Instant,
}

impl ServerState {
    /// Milliseconds since the server started.
    pub(crate) fn server_time(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Builder for configuring and starting a Scribble server.
///
/// # Example
///
/// ```rust,no_run
/// # async fn start() -> Result<(), scribble::ScribbleError> {
/// use scribble::ScribbleServer;
///
/// let server = ScribbleServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct ScribbleServerBuilder {
    config: ServerConfig,
    words: Option<WordBank>,
}

impl ScribbleServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::from_config(ServerConfig::default())
    }

    /// Starts from a loaded configuration, e.g. [`ServerConfig::from_env`].
    pub fn from_config(config: ServerConfig) -> Self {
        Self {
            config,
            words: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind = addr.to_string();
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    pub fn game_config(mut self, config: GameConfig) -> Self {
        self.config.game = config;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Replaces the built-in word lists.
    pub fn word_bank(mut self, words: WordBank) -> Self {
        self.words = Some(words);
        self
    }

    /// Binds the listener and builds the shared state.
    pub async fn build(self) -> Result<ScribbleServer, ScribbleError> {
        let transport = WebSocketTransport::bind(&self.config.bind).await?;
        let words = self.words.unwrap_or_else(WordBank::builtin);
        let registry = RoomRegistry::new(self.config.game, words);

        let state = Arc::new(ServerState {
            sessions: Mutex::new(SessionManager::new(self.config.session)),
            moderation: registry.moderation().clone(),
            rooms: Mutex::new(registry),
            codec: JsonCodec,
            idle_timeout: self.config.idle_timeout,
            handshake_timeout: self.config.handshake_timeout,
            started: Instant::now(),
        });

        Ok(ScribbleServer {
            transport,
            state,
            sweep_interval: self.config.sweep_interval,
        })
    }
}

impl Default for ScribbleServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Scribble server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ScribbleServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
    sweep_interval: Duration,
}

impl ScribbleServer {
    pub fn builder() -> ScribbleServerBuilder {
        ScribbleServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The operator surface: stats, bans, reports and broadcasts.
    pub fn admin(&self) -> Admin {
        Admin::new(Arc::clone(&self.state))
    }

    /// Runs the accept loop and the session sweeper.
    ///
    /// Each accepted connection gets its own handler task. Runs until the
    /// process is terminated.
    pub async fn run(mut self) -> Result<(), ScribbleError> {
        tracing::info!("Scribble server running");
        tokio::spawn(sweep_sessions(Arc::clone(&self.state), self.sweep_interval));

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Periodically expires sessions whose grace window closed. An expired
/// player leaves their room exactly as if they had left on purpose.
async fn sweep_sessions(state: Arc<ServerState>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        sweep_once(&state).await;
    }
}

pub(crate) async fn sweep_once(state: &ServerState) {
    let expired = state.sessions.lock().await.expire_stale();

    for (player_id, room) in expired {
        let Some(code) = room else { continue };
        let handle = state.rooms.lock().await.handle(&code);
        match handle {
            Ok(handle) => {
                if let Err(e) = handle.leave(player_id.clone()).await {
                    tracing::debug!(%player_id, room = %code, error = %e, "expired player already gone");
                }
            }
            Err(e) => tracing::debug!(%player_id, room = %code, error = %e, "room gone before expiry"),
        }
    }

    let removed = state.sessions.lock().await.cleanup_expired();
    let pruned = state.rooms.lock().await.prune_closed();
    if removed > 0 || pruned > 0 {
        tracing::debug!(removed, pruned, "session sweep");
    }
}
