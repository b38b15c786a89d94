//! Per-connection handler: handshake, intent dispatch and event delivery.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive Handshake → validate version → resume or issue a player id
//!   2. Reattach a resumed player to the room they still sit in
//!   3. Send HandshakeAck
//!   4. Loop: client frames → intents, room events → client frames
//!   5. On exit the session enters its grace window and the seat is kept

use std::sync::Arc;

use scribble_protocol::{
    ClientIntent, Codec, Envelope, ErrorKind, IntentError, Payload, PlayerId, ProtocolError,
    RoomCode, ServerEvent, SystemMessage,
};
use scribble_room::{PlayerSender, RoomError, RoomHandle, RoomOutbound};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::ScribbleError;
use crate::server::{PROTOCOL_VERSION, ServerState};
use crate::transport::WebSocketConnection;

/// Whether the message loop keeps going after a frame.
enum Flow {
    Continue,
    Close,
}

/// The server → client half of a connection: numbers and encodes frames.
struct Outgoing<'a> {
    conn: &'a WebSocketConnection,
    state: &'a ServerState,
    seq: u64,
}

impl Outgoing<'_> {
    async fn send(&mut self, payload: Payload) -> Result<(), ScribbleError> {
        self.seq += 1;
        let envelope = Envelope {
            seq: self.seq,
            timestamp: self.state.server_time(),
            payload,
        };
        let bytes = self.state.codec.encode(&envelope)?;
        self.conn.send(&bytes).await?;
        Ok(())
    }

    async fn event(&mut self, event: ServerEvent) -> Result<(), ScribbleError> {
        self.send(Payload::Event(event)).await
    }

    async fn error(&mut self, error: IntentError) -> Result<(), ScribbleError> {
        self.event(ServerEvent::Error(error)).await
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<ServerState>,
) -> Result<(), ScribbleError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer(), "handling new connection");

    let mut out = Outgoing {
        conn: &conn,
        state: &state,
        seq: 0,
    };
    let (tx, mut rx) = mpsc::unbounded_channel();

    let player_id = match perform_handshake(&conn, &mut out, &tx).await {
        Ok(player_id) => player_id,
        Err(e) => {
            conn.close().await;
            return Err(e);
        }
    };
    tracing::info!(%conn_id, %player_id, "player connected");

    let result = serve(&conn, &mut out, &player_id, &tx, &mut rx).await;

    release(&state, &player_id).await;
    conn.close().await;
    result
}

/// Receives the handshake, resolves the session and acknowledges it.
async fn perform_handshake(
    conn: &WebSocketConnection,
    out: &mut Outgoing<'_>,
    tx: &PlayerSender,
) -> Result<PlayerId, ScribbleError> {
    let state = out.state;

    let data = match tokio::time::timeout(state.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage("connection closed before handshake".into()).into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let envelope: Envelope = state.codec.decode(&data)?;

    let (version, requested) = match envelope.payload {
        Payload::System(SystemMessage::Handshake { version, player_id }) => (version, player_id),
        _ => {
            return reject(out, "first message must be a handshake").await;
        }
    };

    if version != PROTOCOL_VERSION {
        return reject(
            out,
            &format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
        )
        .await;
    }

    let mut sessions = state.sessions.lock().await;
    let resolved = sessions
        .resume_or_create(requested.as_ref())
        .map(|(session, resumed)| (session.player_id.clone(), resumed, session.room.clone()));
    let (player_id, resumed, bound) = match resolved {
        Ok(resolved) => resolved,
        Err(e) => {
            drop(sessions);
            out.error(IntentError::new(ErrorKind::Validation, e.to_string(), None))
                .await?;
            return Err(e.into());
        }
    };

    let room = match bound {
        Some(code) => match reattach(state, &code, &player_id, tx).await {
            Ok(()) => Some(code),
            Err(e) => {
                tracing::debug!(%player_id, room = %code, error = %e, "seat lost while away");
                sessions.clear_room(&player_id);
                None
            }
        },
        None => None,
    };
    drop(sessions);

    out.send(Payload::System(SystemMessage::HandshakeAck {
        player_id: player_id.clone(),
        resumed,
        room,
        server_time: state.server_time(),
    }))
    .await?;

    Ok(player_id)
}

async fn reject<T>(out: &mut Outgoing<'_>, message: &str) -> Result<T, ScribbleError> {
    out.error(IntentError::new(ErrorKind::Validation, message, None))
        .await?;
    Err(ProtocolError::InvalidMessage(message.to_string()).into())
}

async fn reattach(
    state: &ServerState,
    code: &RoomCode,
    player_id: &PlayerId,
    tx: &PlayerSender,
) -> Result<(), RoomError> {
    let handle = state.rooms.lock().await.handle(code)?;
    handle.reattach(player_id.clone(), tx.clone()).await
}

/// The message loop. Returns when the client leaves, the transport fails
/// or the connection stays silent past the idle timeout.
async fn serve(
    conn: &WebSocketConnection,
    out: &mut Outgoing<'_>,
    player_id: &PlayerId,
    tx: &PlayerSender,
    rx: &mut mpsc::UnboundedReceiver<RoomOutbound>,
) -> Result<(), ScribbleError> {
    let state = out.state;
    let mut last_seq = 0;
    let mut deadline = Instant::now() + state.idle_timeout;

    loop {
        tokio::select! {
            incoming = conn.recv() => {
                let Some(data) = incoming? else {
                    tracing::info!(%player_id, "connection closed cleanly");
                    return Ok(());
                };
                deadline = Instant::now() + state.idle_timeout;
                // Whatever the rooms queued before this frame arrived is
                // applied first, so a kick or closure is never overtaken.
                while let Ok(outbound) = rx.try_recv() {
                    forward(out, player_id, outbound).await?;
                }
                let flow = handle_frame(out, player_id, tx, &data, &mut last_seq).await?;
                if let Flow::Close = flow {
                    return Ok(());
                }
            }
            Some(outbound) = rx.recv() => {
                forward(out, player_id, outbound).await?;
            }
            () = tokio::time::sleep_until(deadline) => {
                tracing::info!(%player_id, "connection timed out");
                return Ok(());
            }
        }
    }
}

/// Decodes one client frame and acts on it.
async fn handle_frame(
    out: &mut Outgoing<'_>,
    player_id: &PlayerId,
    tx: &PlayerSender,
    data: &[u8],
    last_seq: &mut u64,
) -> Result<Flow, ScribbleError> {
    let state = out.state;

    let envelope: Envelope = match state.codec.decode(data) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!(%player_id, error = %e, "failed to decode envelope");
            out.error(IntentError::new(ErrorKind::Validation, e.to_string(), None))
                .await?;
            return Ok(Flow::Continue);
        }
    };

    if envelope.seq != 0 {
        if envelope.seq <= *last_seq {
            tracing::debug!(%player_id, seq = envelope.seq, "dropping duplicate envelope");
            return Ok(Flow::Continue);
        }
        *last_seq = envelope.seq;
    }

    match envelope.payload {
        Payload::System(msg) => handle_system_message(out, player_id, msg).await,
        Payload::Intent(intent) => {
            let name = intent.name();
            match dispatch_intent(state, player_id, intent, tx).await {
                Ok(Some(reply)) => out.event(reply).await?,
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(%player_id, intent = name, error = %e, "intent rejected");
                    out.error(e.to_intent_error(Some(name))).await?;
                }
            }
            Ok(Flow::Continue)
        }
        Payload::Event(event) => {
            tracing::debug!(%player_id, event = event.name(), "client sent a server event");
            out.error(IntentError::new(
                ErrorKind::Validation,
                "server events are not accepted from clients",
                Some(event.name()),
            ))
            .await?;
            Ok(Flow::Continue)
        }
    }
}

async fn handle_system_message(
    out: &mut Outgoing<'_>,
    player_id: &PlayerId,
    msg: SystemMessage,
) -> Result<Flow, ScribbleError> {
    match msg {
        SystemMessage::Heartbeat { client_time } => {
            let server_time = out.state.server_time();
            out.send(Payload::System(SystemMessage::HeartbeatAck {
                client_time,
                server_time,
            }))
            .await?;
        }
        SystemMessage::Disconnect { reason } => {
            tracing::info!(%player_id, %reason, "client disconnected");
            return Ok(Flow::Close);
        }
        SystemMessage::Handshake { .. } => {
            out.error(IntentError::new(ErrorKind::Validation, "already handshaken", None))
                .await?;
        }
        _ => {
            tracing::debug!(%player_id, "ignoring unexpected system message");
        }
    }
    Ok(Flow::Continue)
}

/// Runs one intent. Returns the direct reply, if the intent has one;
/// everything else reaches the client through the room's events.
async fn dispatch_intent(
    state: &ServerState,
    player_id: &PlayerId,
    intent: ClientIntent,
    tx: &PlayerSender,
) -> Result<Option<ServerEvent>, ScribbleError> {
    match intent {
        ClientIntent::CreateRoom {
            player_name,
            settings,
            code,
        } => {
            ensure_unseated(state, player_id).await?;
            let code = state
                .rooms
                .lock()
                .await
                .create_room(
                    player_id.clone(),
                    &player_name,
                    settings,
                    code.as_deref(),
                    tx.clone(),
                )
                .await?;
            state.sessions.lock().await.bind_room(player_id, code)?;
            Ok(None)
        }

        ClientIntent::JoinRoom {
            code,
            player_name,
            spectate,
        } => {
            ensure_unseated(state, player_id).await?;
            let code = RoomCode::parse(&code)?;
            let handle = state.rooms.lock().await.handle(&code)?;
            handle
                .join(player_id.clone(), player_name, spectate, tx.clone())
                .await?;
            state.sessions.lock().await.bind_room(player_id, code)?;
            Ok(None)
        }

        ClientIntent::LeaveRoom => {
            let handle = seated_room(state, player_id).await?;
            let left = handle.leave(player_id.clone()).await;
            state.sessions.lock().await.clear_room(player_id);
            left?;
            Ok(None)
        }

        ClientIntent::Appeal => {
            let decision = state.moderation.contest(player_id)?;
            tracing::info!(%player_id, verdict = ?decision.verdict, "appeal decided");
            Ok(Some(ServerEvent::AppealResult {
                verdict: decision.verdict,
                rationale: decision.rationale,
                evidence: decision.evidence,
            }))
        }

        other => {
            let handle = seated_room(state, player_id).await?;
            handle.intent(player_id.clone(), other).await?;
            Ok(None)
        }
    }
}

/// Rejects a create/join from a player who already sits in a live room.
/// A binding to a room that has since closed is dropped.
async fn ensure_unseated(state: &ServerState, player_id: &PlayerId) -> Result<(), RoomError> {
    let mut sessions = state.sessions.lock().await;
    let Some(code) = sessions.room_of(player_id).cloned() else {
        return Ok(());
    };
    if state.rooms.lock().await.handle(&code).is_ok() {
        return Err(RoomError::AlreadyInRoom(player_id.clone(), code));
    }
    sessions.clear_room(player_id);
    Ok(())
}

async fn seated_room(state: &ServerState, player_id: &PlayerId) -> Result<RoomHandle, RoomError> {
    let code = state
        .sessions
        .lock()
        .await
        .room_of(player_id)
        .cloned()
        .ok_or_else(|| RoomError::Validation("join a room first".into()))?;
    state.rooms.lock().await.handle(&code)
}

/// Delivers one room message to the client.
async fn forward(
    out: &mut Outgoing<'_>,
    player_id: &PlayerId,
    outbound: RoomOutbound,
) -> Result<(), ScribbleError> {
    match outbound {
        RoomOutbound::Event(event) => out.event(event).await,
        RoomOutbound::Detached { code, reason } => {
            let mut sessions = out.state.sessions.lock().await;
            if sessions.room_of(player_id) == Some(&code) {
                sessions.clear_room(player_id);
            }
            tracing::debug!(%player_id, room = %code, %reason, "detached from room");
            Ok(())
        }
    }
}

/// Starts the grace window and tells the room the seat is unattended.
///
/// The session lock is held until the room has processed the detach, so a
/// quick reconnect cannot reattach before the old connection lets go.
async fn release(state: &ServerState, player_id: &PlayerId) {
    let mut sessions = state.sessions.lock().await;
    if let Err(e) = sessions.disconnect(player_id) {
        tracing::debug!(%player_id, error = %e, "no session to release");
        return;
    }
    let Some(code) = sessions.room_of(player_id).cloned() else {
        return;
    };
    let handle = state.rooms.lock().await.handle(&code);
    if let Ok(handle) = handle {
        if let Err(e) = handle.detach(player_id.clone()).await {
            tracing::debug!(%player_id, room = %code, error = %e, "detach failed");
        }
    }
}
