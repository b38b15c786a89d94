//! The authoritative turn/phase state machine of one room.
//!
//! [`GameRoom`] is plain synchronous state: it never awaits and never reads
//! a clock. The room actor feeds it intents and timer ticks one at a time
//! (with the wall-clock time as an argument), then drains the events it
//! queued and the players it removed. That keeps every rule in this file
//! unit-testable without a runtime.
//!
//! ```text
//! waiting → choosing → drawing → roundEnd → { choosing | gameEnd }
//!    ↑                                                  │
//!    └──────────────────── play again ──────────────────┘
//! ```
//!
//! One tick is one second of game time. `time_left` counts down the
//! current timed phase: the word choice, the drawing, or the turn result.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

use rand::rngs::StdRng;
use scribble_engine::{
    AntiCheatEngine, Assessment, BehaviorRecord, GuessOutcome, HintSchedule, Recommendation,
    WordBank, evaluate_guess, mask, maskable_indices, normalize, pick_reveal, validate_name,
};
use scribble_protocol::{
    ChatMessage, ClientIntent, ClientSignals, DrawStroke, EvidenceTag, Phase, PlayerId,
    PlayerView, Recipient, RoomCode, RoomSettings, RoomSnapshot, ScoreLine, ServerEvent,
    Standing, TurnEndReason, Visibility,
};
use ulid::Ulid;

use crate::moderation::{IssuedBy, Moderation, NewBan, NewReport};
use crate::{GameConfig, RoomError};

/// Longest accepted chat line, in chars.
pub const MAX_CHAT_LEN: usize = 200;
/// Most points in one stroke.
pub const MAX_STROKE_POINTS: usize = 4_096;
/// Most strokes kept in a turn's canvas log.
pub const MAX_STROKES: usize = 5_000;
/// Chat lines kept for replay.
const CHAT_LOG_CAPACITY: usize = 300;
const STROKE_SIZE: std::ops::RangeInclusive<f32> = 0.5..=100.0;

const AVATAR_COLORS: &[&str] = &[
    "#e53935", "#8e24aa", "#3949ab", "#039be5", "#00897b", "#7cb342", "#fdd835", "#fb8c00",
    "#6d4c41", "#546e7a", "#d81b60", "#00acc1",
];

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// A seat in the room. Owned by exactly one room.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    /// Points earned in the current turn.
    pub round_score: u32,
    pub avatar_color: String,
    pub is_host: bool,
    pub is_connected: bool,
    pub is_spectator: bool,
    pub is_muted: bool,
    pub has_guessed: bool,
    /// Anti-cheat warnings collected in this room.
    pub strikes: u32,
    /// Milliseconds since the Unix epoch.
    pub joined_at: u64,
    behavior: BehaviorRecord,
}

impl Player {
    fn plays(&self) -> bool {
        !self.is_spectator
    }
}

/// A player the room let go of, for the actor to detach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub player_id: PlayerId,
    pub reason: String,
}

/// A logged chat line. `audience: None` means everyone may see it.
#[derive(Debug, Clone)]
struct LoggedChat {
    message: ChatMessage,
    audience: Option<Vec<PlayerId>>,
}

/// Summary of a room for listings and the admin surface.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub code: RoomCode,
    pub phase: Phase,
    pub round: u32,
    pub max_rounds: u32,
    pub player_count: usize,
    pub spectator_count: usize,
    pub connected_count: usize,
    pub max_players: usize,
    pub visibility: Visibility,
    pub theme: String,
    pub language: String,
    pub host: Option<String>,
    pub created_at: i64,
}

/// Shared collaborators of every room.
#[derive(Clone)]
pub struct RoomDeps {
    pub config: Arc<GameConfig>,
    pub words: Arc<WordBank>,
    pub moderation: Moderation,
}

// ---------------------------------------------------------------------------
// GameRoom
// ---------------------------------------------------------------------------

pub struct GameRoom {
    code: RoomCode,
    settings: RoomSettings,
    phase: Phase,
    round: u32,
    time_left: u32,
    drawer: Option<PlayerId>,
    word: Option<String>,
    word_choices: Vec<String>,
    revealed: BTreeSet<usize>,
    hints: HintSchedule,
    hints_given: usize,
    /// Join order. Host migration and drawer rotation follow it.
    players: Vec<Player>,
    strokes: Vec<DrawStroke>,
    chat: VecDeque<LoggedChat>,
    created_at: u64,
    /// Players who already drew in the current round.
    drawn: HashSet<PlayerId>,
    correct_guesses: usize,
    turn_started_ms: u64,
    recent_words: VecDeque<String>,
    joins: usize,

    deps: RoomDeps,
    anticheat: AntiCheatEngine,
    rng: StdRng,
    outbox: Vec<(Recipient, ServerEvent)>,
    departures: Vec<Departure>,
}

impl GameRoom {
    pub fn new(
        code: RoomCode,
        settings: RoomSettings,
        deps: RoomDeps,
        rng: StdRng,
        now_ms: u64,
    ) -> Self {
        let anticheat = AntiCheatEngine::new(deps.config.anticheat.clone());
        Self {
            code,
            settings,
            phase: Phase::Waiting,
            round: 0,
            time_left: 0,
            drawer: None,
            word: None,
            word_choices: Vec::new(),
            revealed: BTreeSet::new(),
            hints: HintSchedule::new(0, 0, &[]),
            hints_given: 0,
            players: Vec::new(),
            strokes: Vec::new(),
            chat: VecDeque::new(),
            created_at: now_ms,
            drawn: HashSet::new(),
            correct_guesses: 0,
            turn_started_ms: now_ms,
            recent_words: VecDeque::new(),
            joins: 0,
            deps,
            anticheat,
            rng,
            outbox: Vec::new(),
            departures: Vec::new(),
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    pub fn drawer(&self) -> Option<&PlayerId> {
        self.drawer.as_ref()
    }

    /// The secret word of the current turn.
    pub fn word(&self) -> Option<&str> {
        self.word.as_deref()
    }

    /// Words offered to the drawer while choosing.
    pub fn word_choices(&self) -> &[String] {
        &self.word_choices
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    pub fn host(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_host)
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn strokes(&self) -> &[DrawStroke] {
        &self.strokes
    }

    /// Whether the phase timer should run.
    pub fn needs_clock(&self) -> bool {
        self.phase.is_timed()
    }

    /// Takes the events queued since the last call, in production order.
    pub fn drain_outbox(&mut self) -> Vec<(Recipient, ServerEvent)> {
        std::mem::take(&mut self.outbox)
    }

    /// Takes the players removed since the last call.
    pub fn drain_departures(&mut self) -> Vec<Departure> {
        std::mem::take(&mut self.departures)
    }

    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            code: self.code.clone(),
            phase: self.phase,
            round: self.round,
            max_rounds: self.settings.max_rounds,
            player_count: self.players.len(),
            spectator_count: self.players.iter().filter(|p| p.is_spectator).count(),
            connected_count: self.players.iter().filter(|p| p.is_connected).count(),
            max_players: self.settings.max_players,
            visibility: self.settings.visibility,
            theme: self.settings.theme.clone(),
            language: self.settings.language.clone(),
            host: self.host().map(|p| p.name.clone()),
            created_at: self.created_at as i64,
        }
    }

    /// Full room state as `viewer` may see it.
    pub fn snapshot_for(&self, viewer: &PlayerId) -> RoomSnapshot {
        let viewer_player = self.player(viewer);
        let is_drawer = self.drawer.as_ref() == Some(viewer);
        let has_guessed = viewer_player.is_some_and(|p| p.has_guessed);
        let revealed_to_all = matches!(self.phase, Phase::RoundEnd | Phase::GameEnd);

        let word = self
            .word
            .clone()
            .filter(|_| is_drawer || has_guessed || revealed_to_all);
        let masked_word = match (&self.word, self.phase) {
            (Some(word), Phase::Drawing) => mask(word, &self.revealed),
            (Some(word), Phase::RoundEnd) => word.clone(),
            _ => String::new(),
        };
        let word_choices = if is_drawer && self.phase == Phase::Choosing {
            self.word_choices.clone()
        } else {
            Vec::new()
        };
        let chat = self
            .chat
            .iter()
            .filter(|line| {
                line.audience
                    .as_ref()
                    .is_none_or(|audience| audience.contains(viewer))
            })
            .map(|line| line.message.clone())
            .collect();

        RoomSnapshot {
            code: self.code.clone(),
            you: viewer.clone(),
            phase: self.phase,
            round: self.round,
            settings: self.settings.clone(),
            time_left: self.time_left,
            drawer: self.drawer.clone(),
            masked_word,
            word,
            word_choices,
            players: self.players.iter().map(|p| self.view_of(p)).collect(),
            strokes: self.strokes.clone(),
            chat,
            created_at: self.created_at as i64,
        }
    }

    fn view_of(&self, p: &Player) -> PlayerView {
        PlayerView {
            id: p.id.clone(),
            name: p.name.clone(),
            score: p.score,
            round_score: p.round_score,
            avatar_color: p.avatar_color.clone(),
            is_host: p.is_host,
            is_drawing: self.drawer.as_ref() == Some(&p.id),
            has_guessed: p.has_guessed,
            is_connected: p.is_connected,
            is_spectator: p.is_spectator,
            is_muted: p.is_muted,
        }
    }

    /// Players ranked by score, highest first. Ties keep join order.
    pub fn standings(&self) -> Vec<Standing> {
        let mut ranked: Vec<&Player> = self.players.iter().filter(|p| p.plays()).collect();
        // Stable sort: equal scores stay in join order.
        ranked.sort_by_key(|p| Reverse(p.score));
        ranked
            .into_iter()
            .enumerate()
            .map(|(i, p)| Standing {
                rank: i + 1,
                player_id: p.id.clone(),
                name: p.name.clone(),
                score: p.score,
            })
            .collect()
    }

    // -- membership ---------------------------------------------------------

    /// Seats a player. The first player becomes host.
    ///
    /// # Errors
    /// Phase (not `waiting`), duplicate membership, capacity, an active
    /// ban, or a name that fails validation or is already taken.
    pub fn add_player(
        &mut self,
        id: PlayerId,
        raw_name: &str,
        spectate: bool,
        now_ms: u64,
    ) -> Result<(), RoomError> {
        if self.phase != Phase::Waiting {
            return Err(RoomError::InvalidPhase(
                "the game has already started".into(),
            ));
        }
        if self.index_of(&id).is_ok() {
            return Err(RoomError::AlreadyInRoom(id, self.code.clone()));
        }
        if self.players.len() >= self.settings.max_players {
            return Err(RoomError::RoomFull(self.code.clone()));
        }
        if self.deps.moderation.is_banned(&id) {
            return Err(RoomError::Banned(id));
        }
        let name = validate_name(raw_name).map_err(|e| RoomError::Validation(e.to_string()))?;
        if self.find_by_name(&name).is_some() {
            return Err(RoomError::Validation(format!("the name {name} is taken")));
        }

        let avatar_color = AVATAR_COLORS[self.joins % AVATAR_COLORS.len()].to_string();
        self.joins += 1;
        let is_host = self.players.is_empty();
        self.players.push(Player {
            id: id.clone(),
            name: name.clone(),
            score: 0,
            round_score: 0,
            avatar_color,
            is_host,
            is_connected: true,
            is_spectator: spectate,
            is_muted: false,
            has_guessed: false,
            strikes: 0,
            joined_at: now_ms,
            behavior: BehaviorRecord::new(),
        });

        tracing::info!(room = %self.code, player_id = %id, %name, spectate, is_host, "player joined");
        self.system_message(format!("{name} joined the room"), now_ms);
        self.broadcast_sync();
        Ok(())
    }

    /// Removes a player with leave semantics: host migration, turn end if
    /// they were drawing, game end if too few players remain.
    ///
    /// # Errors
    /// [`RoomError::PlayerNotFound`] if the player is not seated.
    pub fn remove_player(&mut self, id: &PlayerId, reason: &str, now_ms: u64) -> Result<(), RoomError> {
        let index = self.index_of(id)?;
        let player = self.players.remove(index);
        let was_drawer = self.drawer.as_ref() == Some(id);
        self.departures.push(Departure {
            player_id: id.clone(),
            reason: reason.to_string(),
        });
        tracing::info!(
            room = %self.code,
            player_id = %id,
            reason,
            players = self.players.len(),
            "player left"
        );

        if self.players.is_empty() {
            return Ok(());
        }

        if player.is_host {
            let heir = &mut self.players[0];
            heir.is_host = true;
            let (host_id, host_name) = (heir.id.clone(), heir.name.clone());
            tracing::info!(room = %self.code, %host_id, "host migrated");
            self.emit(Recipient::All, ServerEvent::HostChanged { host_id, host_name });
        }
        self.system_message(format!("{} left the room", player.name), now_ms);

        if self.phase.is_in_game() {
            if was_drawer && matches!(self.phase, Phase::Choosing | Phase::Drawing) {
                self.end_turn(TurnEndReason::DrawerLeft, now_ms);
            }
            if self.playing_count() < 2 {
                self.end_game();
            } else if self.phase == Phase::Drawing && self.all_guessed() {
                self.end_turn(TurnEndReason::AllGuessed, now_ms);
            }
        }
        self.broadcast_sync();
        Ok(())
    }

    /// Transport dropped: the seat is kept, the player is marked offline.
    /// A drawer's turn ends immediately.
    ///
    /// # Errors
    /// [`RoomError::PlayerNotFound`] if the player is not seated.
    pub fn disconnect(&mut self, id: &PlayerId, now_ms: u64) -> Result<(), RoomError> {
        let index = self.index_of(id)?;
        self.players[index].is_connected = false;
        tracing::info!(room = %self.code, player_id = %id, "player disconnected");

        let is_drawer = self.drawer.as_ref() == Some(id);
        if is_drawer && matches!(self.phase, Phase::Choosing | Phase::Drawing) {
            self.end_turn(TurnEndReason::DrawerLeft, now_ms);
        } else if self.phase == Phase::Drawing && self.all_guessed() {
            self.end_turn(TurnEndReason::AllGuessed, now_ms);
        }
        self.broadcast_sync();
        Ok(())
    }

    /// The player is back inside the grace window. Score, round and host
    /// status are untouched.
    ///
    /// # Errors
    /// [`RoomError::PlayerNotFound`] if the seat was given up meanwhile.
    pub fn reconnect(&mut self, id: &PlayerId) -> Result<(), RoomError> {
        let index = self.index_of(id)?;
        self.players[index].is_connected = true;
        tracing::info!(room = %self.code, player_id = %id, "player reconnected");
        self.broadcast_sync();
        Ok(())
    }

    // -- intents ------------------------------------------------------------

    /// Applies one client intent.
    ///
    /// # Errors
    /// Any [`RoomError`]; a rejected intent changes nothing, except for
    /// anti-cheat outcomes, which are applied before the rejection.
    pub fn handle_intent(
        &mut self,
        player: &PlayerId,
        intent: ClientIntent,
        now_ms: u64,
    ) -> Result<(), RoomError> {
        self.index_of(player)?;
        match intent {
            ClientIntent::CreateRoom { .. } | ClientIntent::JoinRoom { .. } => {
                Err(RoomError::AlreadyInRoom(player.clone(), self.code.clone()))
            }
            ClientIntent::LeaveRoom => self.remove_player(player, "left", now_ms),
            ClientIntent::UpdateSettings(settings) => self.update_settings(player, settings),
            ClientIntent::StartGame => self.start_game(player),
            ClientIntent::SelectWord { word } => self.select_word(player, &word, now_ms),
            ClientIntent::NextRound => self.next_round(player),
            ClientIntent::PlayAgain => self.play_again(player),
            ClientIntent::Chat { text, signals } => self.chat(player, &text, signals, now_ms),
            ClientIntent::Stroke(stroke) => self.stroke(player, stroke),
            ClientIntent::ClearCanvas => self.clear_canvas(player),
            ClientIntent::Undo => self.undo(player),
            ClientIntent::Kick { target } => self.kick(player, &target, now_ms),
            ClientIntent::Ban { target, reason } => self.ban(player, &target, reason, now_ms),
            ClientIntent::Report {
                target,
                reason,
                details,
            } => self.report(player, &target, &reason, &details, now_ms),
            ClientIntent::Appeal => Err(RoomError::Validation(
                "appeals are not sent to a room".into(),
            )),
        }
    }

    fn update_settings(&mut self, player: &PlayerId, settings: RoomSettings) -> Result<(), RoomError> {
        self.require_host(player)?;
        self.require_phase(Phase::Waiting, "settings can only change before the game")?;
        settings.check().map_err(RoomError::Validation)?;
        if settings.max_players < self.players.len() {
            return Err(RoomError::Validation(format!(
                "maxPlayers cannot be below the {} seated players",
                self.players.len()
            )));
        }
        tracing::debug!(room = %self.code, ?settings, "settings updated");
        self.settings = settings;
        self.broadcast_sync();
        Ok(())
    }

    fn start_game(&mut self, player: &PlayerId) -> Result<(), RoomError> {
        self.require_host(player)?;
        self.require_phase(Phase::Waiting, "the game is already running")?;
        let ready = self
            .players
            .iter()
            .filter(|p| p.plays() && p.is_connected)
            .count();
        if ready < 2 {
            return Err(RoomError::Validation(
                "at least 2 players are needed to start".into(),
            ));
        }

        for p in &mut self.players {
            p.score = 0;
            p.round_score = 0;
            p.has_guessed = false;
        }
        self.round = 1;
        self.drawn.clear();
        self.strokes.clear();

        let players: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|p| p.plays())
            .map(|p| p.id.clone())
            .collect();
        tracing::info!(room = %self.code, players = players.len(), "game started");
        self.emit(
            Recipient::All,
            ServerEvent::GameStarting {
                max_rounds: self.settings.max_rounds,
                players,
            },
        );

        match self.next_drawer() {
            Some(drawer) => self.start_choosing(drawer),
            None => self.end_game(),
        }
        Ok(())
    }

    fn select_word(&mut self, player: &PlayerId, word: &str, now_ms: u64) -> Result<(), RoomError> {
        self.require_phase(Phase::Choosing, "no word choice is pending")?;
        if self.drawer.as_ref() != Some(player) {
            return Err(RoomError::NotPermitted(
                "only the drawer chooses the word".into(),
            ));
        }
        let wanted = normalize(word);
        let chosen = self
            .word_choices
            .iter()
            .find(|w| normalize(w) == wanted)
            .cloned()
            .ok_or_else(|| RoomError::Validation(format!("{word:?} was not offered")))?;
        self.start_drawing(chosen, now_ms);
        Ok(())
    }

    fn next_round(&mut self, player: &PlayerId) -> Result<(), RoomError> {
        self.require_host(player)?;
        self.require_phase(Phase::RoundEnd, "there is no turn result to skip")?;
        self.advance();
        Ok(())
    }

    fn play_again(&mut self, player: &PlayerId) -> Result<(), RoomError> {
        self.require_host(player)?;
        self.require_phase(Phase::GameEnd, "the game has not ended")?;
        for p in &mut self.players {
            p.score = 0;
            p.round_score = 0;
            p.has_guessed = false;
        }
        self.phase = Phase::Waiting;
        self.round = 0;
        self.time_left = 0;
        self.word = None;
        self.revealed.clear();
        self.strokes.clear();
        self.drawn.clear();
        tracing::info!(room = %self.code, "back to waiting");
        self.broadcast_sync();
        Ok(())
    }

    // -- chat ---------------------------------------------------------------

    fn chat(
        &mut self,
        player: &PlayerId,
        text: &str,
        signals: ClientSignals,
        now_ms: u64,
    ) -> Result<(), RoomError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RoomError::Validation("message is empty".into()));
        }
        if text.chars().count() > MAX_CHAT_LEN {
            return Err(RoomError::Validation(format!(
                "message exceeds {MAX_CHAT_LEN} characters"
            )));
        }

        let index = self.index_of(player)?;
        let assessment =
            self.anticheat
                .observe_message(&mut self.players[index].behavior, now_ms, text, signals);
        match assessment.recommendation {
            Recommendation::Ban => return Err(self.ban_for_cheating(index, assessment, now_ms)),
            Recommendation::Warn => {
                self.warn_player(index, &assessment, now_ms);
                return Ok(());
            }
            Recommendation::Allow => self.players[index].is_muted = false,
        }

        if let Some(command) = text.strip_prefix('/') {
            return self.command(player, command, now_ms);
        }

        let sender = &self.players[index];
        let in_turn = self.phase == Phase::Drawing && sender.plays();
        let is_drawer = self.drawer.as_ref() == Some(player);
        if in_turn && (is_drawer || sender.has_guessed) {
            // Players who know the word only talk among themselves.
            let audience = self.knowing_circle();
            let message = self.chat_line(index, text, false, false, now_ms);
            self.log_chat(message.clone(), Some(audience.clone()));
            self.emit(Recipient::Only(audience), ServerEvent::Chat(message));
            return Ok(());
        }

        if in_turn {
            if let Some(secret) = self.word.clone() {
                match evaluate_guess(text, &secret, &self.deps.config.scoring) {
                    GuessOutcome::Correct => return self.correct_guess(index, &secret, now_ms),
                    GuessOutcome::Close => {
                        let message = self.chat_line(index, text, false, true, now_ms);
                        self.log_chat(message.clone(), Some(vec![player.clone()]));
                        self.emit(Recipient::Player(player.clone()), ServerEvent::Chat(message));
                        return Ok(());
                    }
                    GuessOutcome::Miss => {}
                }
            }
        }

        let message = self.chat_line(index, text, false, false, now_ms);
        self.log_chat(message.clone(), None);
        self.emit(Recipient::All, ServerEvent::Chat(message));
        Ok(())
    }

    fn correct_guess(&mut self, index: usize, secret: &str, now_ms: u64) -> Result<(), RoomError> {
        let latency = now_ms.saturating_sub(self.turn_started_ms);
        let assessment = self
            .anticheat
            .observe_correct_guess(&mut self.players[index].behavior, latency);
        match assessment.recommendation {
            Recommendation::Ban => return Err(self.ban_for_cheating(index, assessment, now_ms)),
            Recommendation::Warn => self.warn_player(index, &assessment, now_ms),
            Recommendation::Allow => {}
        }

        let elapsed = self.settings.draw_time.saturating_sub(self.time_left);
        let scoring = &self.deps.config.scoring;
        let points = scoring.guess_points(self.correct_guesses, elapsed, self.settings.draw_time);
        let drawer_points = scoring.drawer_points();
        self.correct_guesses += 1;

        let guesser = &mut self.players[index];
        guesser.score += points;
        guesser.round_score += points;
        guesser.has_guessed = true;
        let (player_id, player_name) = (guesser.id.clone(), guesser.name.clone());

        if let Some(drawer) = self.drawer.clone() {
            if let Ok(d) = self.index_of(&drawer) {
                self.players[d].score += drawer_points;
                self.players[d].round_score += drawer_points;
            }
        }

        tracing::debug!(room = %self.code, %player_id, points, "correct guess");
        let mut found = self.system_line(format!("{player_name} found it"), now_ms);
        found.is_correct = true;
        self.log_chat(found.clone(), None);
        self.emit(Recipient::All, ServerEvent::Chat(found));
        self.emit(
            Recipient::All,
            ServerEvent::CorrectGuess {
                player_id: player_id.clone(),
                player_name,
                points,
                drawer_points,
            },
        );
        self.emit(
            Recipient::Player(player_id),
            ServerEvent::Word {
                word: secret.to_string(),
            },
        );

        if self.all_guessed() {
            self.end_turn(TurnEndReason::AllGuessed, now_ms);
        }
        Ok(())
    }

    fn command(&mut self, player: &PlayerId, command: &str, now_ms: u64) -> Result<(), RoomError> {
        let mut parts = command.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default().to_lowercase();
        let rest = parts.next().unwrap_or_default().trim();
        match name.as_str() {
            "report" => {
                let words: Vec<&str> = rest.split_whitespace().collect();
                // Names may contain spaces: take the longest matching prefix.
                for take in (1..=words.len()).rev() {
                    let candidate = words[..take].join(" ");
                    if let Some(target) = self.find_by_name(&candidate).map(|p| p.id.clone()) {
                        let reason = match words[take..].join(" ") {
                            r if r.is_empty() => "unspecified".to_string(),
                            r => r,
                        };
                        return self.report(player, &target, &reason, "", now_ms);
                    }
                }
                Err(RoomError::UnknownPlayerName(rest.to_string()))
            }
            other => Err(RoomError::Validation(format!("unknown command /{other}"))),
        }
    }

    // -- canvas -------------------------------------------------------------

    fn require_drawing(&self, player: &PlayerId) -> Result<(), RoomError> {
        self.require_phase(Phase::Drawing, "the canvas is closed outside a turn")?;
        if self.drawer.as_ref() != Some(player) {
            return Err(RoomError::InvalidPhase("only the drawer can draw".into()));
        }
        Ok(())
    }

    fn stroke(&mut self, player: &PlayerId, stroke: DrawStroke) -> Result<(), RoomError> {
        self.require_drawing(player)?;
        if stroke.points.is_empty() || stroke.points.len() > MAX_STROKE_POINTS {
            return Err(RoomError::Validation(format!(
                "a stroke needs 1 to {MAX_STROKE_POINTS} points"
            )));
        }
        if !STROKE_SIZE.contains(&stroke.size) {
            return Err(RoomError::Validation("brush size out of range".into()));
        }
        if self.strokes.len() >= MAX_STROKES {
            return Err(RoomError::Validation("the canvas is full".into()));
        }
        self.strokes.push(stroke.clone());
        self.emit(Recipient::AllExcept(player.clone()), ServerEvent::Stroke(stroke));
        Ok(())
    }

    fn clear_canvas(&mut self, player: &PlayerId) -> Result<(), RoomError> {
        self.require_drawing(player)?;
        self.strokes.clear();
        self.emit(Recipient::All, ServerEvent::ClearCanvas);
        Ok(())
    }

    fn undo(&mut self, player: &PlayerId) -> Result<(), RoomError> {
        self.require_drawing(player)?;
        if self.strokes.pop().is_some() {
            self.emit(Recipient::All, ServerEvent::Undo);
        }
        Ok(())
    }

    // -- moderation ---------------------------------------------------------

    fn moderation_target(&self, host: &PlayerId, target: &PlayerId) -> Result<usize, RoomError> {
        self.require_host(host)?;
        let index = self
            .index_of(target)
            .map_err(|_| RoomError::PlayerNotFound(target.clone()))?;
        if self.players[index].is_host {
            return Err(RoomError::NotPermitted(
                "the host cannot be removed".into(),
            ));
        }
        Ok(index)
    }

    fn kick(&mut self, host: &PlayerId, target: &PlayerId, now_ms: u64) -> Result<(), RoomError> {
        let index = self.moderation_target(host, target)?;
        let player_name = self.players[index].name.clone();
        self.emit(
            Recipient::All,
            ServerEvent::Kicked {
                player_id: target.clone(),
                player_name,
            },
        );
        self.remove_player(target, "kicked by the host", now_ms)
    }

    fn ban(
        &mut self,
        host: &PlayerId,
        target: &PlayerId,
        reason: Option<String>,
        now_ms: u64,
    ) -> Result<(), RoomError> {
        let index = self.moderation_target(host, target)?;
        let player = &self.players[index];
        let entry = self.deps.moderation.ban(NewBan {
            player_id: player.id.clone(),
            player_name: player.name.clone(),
            reason: reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| "banned by the host".to_string()),
            issued_by: IssuedBy::Host,
            duration_secs: Some(self.deps.config.host_ban_secs),
            evidence: BTreeSet::new(),
            prior_warnings: player.strikes,
        });
        self.emit(Recipient::All, ServerEvent::Banned(entry.notice()));
        self.remove_player(target, "banned by the host", now_ms)
    }

    fn report(
        &mut self,
        reporter: &PlayerId,
        target: &PlayerId,
        reason: &str,
        details: &str,
        now_ms: u64,
    ) -> Result<(), RoomError> {
        if reporter == target {
            return Err(RoomError::Validation("you cannot report yourself".into()));
        }
        let reason = reason.trim();
        if reason.is_empty() || reason.chars().count() > MAX_CHAT_LEN {
            return Err(RoomError::Validation(format!(
                "a report reason needs 1 to {MAX_CHAT_LEN} characters"
            )));
        }
        let reported = self
            .player(target)
            .ok_or_else(|| RoomError::PlayerNotFound(target.clone()))?;
        let reported_name = reported.name.clone();
        let reporter_name = self.name_of(reporter);

        self.deps.moderation.file_report(NewReport {
            reporter_id: reporter.clone(),
            reporter_name,
            reported_id: target.clone(),
            reported_name: reported_name.clone(),
            room: self.code.clone(),
            reason: reason.to_string(),
            details: details.trim().to_string(),
        });

        let notice = self.system_line(format!("Report against {reported_name} sent to the moderators"), now_ms);
        self.log_chat(notice.clone(), Some(vec![reporter.clone()]));
        self.emit(Recipient::Player(reporter.clone()), ServerEvent::Chat(notice));
        Ok(())
    }

    fn warn_player(&mut self, index: usize, assessment: &Assessment, now_ms: u64) {
        let player = &mut self.players[index];
        player.strikes += 1;
        player.is_muted = true;
        let id = player.id.clone();
        tracing::warn!(
            room = %self.code,
            player_id = %id,
            confidence = assessment.confidence,
            tags = ?assessment.tags,
            "anti-cheat warning"
        );
        let notice = self.system_line(
            format!(
                "Message blocked for suspicious activity ({}). Slow down.",
                tag_list(&assessment.tags)
            ),
            now_ms,
        );
        self.log_chat(notice.clone(), Some(vec![id.clone()]));
        self.emit(Recipient::Player(id.clone()), ServerEvent::Chat(notice));
        self.broadcast_sync_to(&id);
    }

    /// Applies an anti-cheat ban and returns the error for the intent.
    fn ban_for_cheating(&mut self, index: usize, assessment: Assessment, now_ms: u64) -> RoomError {
        let player = &self.players[index];
        let id = player.id.clone();
        let entry = self.deps.moderation.ban(NewBan {
            player_id: id.clone(),
            player_name: player.name.clone(),
            reason: "automated: suspicious activity".into(),
            issued_by: IssuedBy::AntiCheat,
            duration_secs: Some(self.deps.config.temp_ban_secs),
            evidence: assessment.tags.clone(),
            prior_warnings: player.behavior.warnings(),
        });
        tracing::warn!(
            room = %self.code,
            player_id = %id,
            confidence = assessment.confidence,
            tags = ?assessment.tags,
            "anti-cheat ban"
        );
        self.emit(Recipient::All, ServerEvent::Banned(entry.notice()));
        if let Err(err) = self.remove_player(&id, "banned for suspicious activity", now_ms) {
            tracing::error!(room = %self.code, player_id = %id, %err, "banned player was not seated");
        }
        RoomError::Trust(assessment.tags.into_iter().collect())
    }

    // -- clock --------------------------------------------------------------

    /// Advances game time by one second.
    pub fn tick(&mut self, now_ms: u64) {
        match self.phase {
            Phase::Choosing => {
                self.time_left = self.time_left.saturating_sub(1);
                if self.time_left == 0 {
                    self.auto_pick(now_ms);
                }
            }
            Phase::Drawing => {
                self.time_left = self.time_left.saturating_sub(1);
                self.emit(
                    Recipient::All,
                    ServerEvent::TimeUpdate {
                        time_left: self.time_left,
                    },
                );
                self.reveal_due_hints();
                if self.time_left == 0 {
                    self.end_turn(TurnEndReason::TimeUp, now_ms);
                }
            }
            Phase::RoundEnd => {
                self.time_left = self.time_left.saturating_sub(1);
                if self.time_left == 0 {
                    self.advance();
                }
            }
            Phase::Waiting | Phase::GameEnd => {}
        }
    }

    fn auto_pick(&mut self, now_ms: u64) {
        let fallback = || {
            self.deps
                .words
                .pool(&self.settings.language, &self.settings.theme)
                .first()
                .cloned()
        };
        match self.word_choices.first().cloned().or_else(fallback) {
            Some(word) => {
                tracing::debug!(room = %self.code, "choice timed out, picking the first word");
                self.start_drawing(word, now_ms);
            }
            None => self.end_turn(TurnEndReason::TimeUp, now_ms),
        }
    }

    fn reveal_due_hints(&mut self) {
        let Some(word) = self.word.clone() else {
            return;
        };
        let elapsed = self.settings.draw_time.saturating_sub(self.time_left);
        while self.hints_given < self.hints.due(elapsed) {
            let Some((index, letter)) = pick_reveal(&word, &self.revealed, &mut self.rng) else {
                break;
            };
            self.revealed.insert(index);
            self.hints_given += 1;
            self.emit(
                Recipient::All,
                ServerEvent::Hint {
                    masked_word: mask(&word, &self.revealed),
                    index,
                    letter,
                },
            );
        }
    }

    // -- transitions --------------------------------------------------------

    fn start_choosing(&mut self, drawer: PlayerId) {
        self.phase = Phase::Choosing;
        self.time_left = self.deps.config.timing.choose_secs;
        self.word = None;
        self.revealed.clear();
        self.drawn.insert(drawer.clone());
        for p in &mut self.players {
            p.has_guessed = false;
            p.round_score = 0;
        }

        let recent: Vec<String> = self.recent_words.iter().cloned().collect();
        self.word_choices = self.deps.words.choices(
            &self.settings.language,
            &self.settings.theme,
            self.deps.config.choice_count,
            &recent,
            &mut self.rng,
        );
        self.drawer = Some(drawer.clone());

        let drawer_name = self.name_of(&drawer);
        let timeout = self.time_left;
        tracing::debug!(room = %self.code, drawer = %drawer, round = self.round, "drawer choosing");
        self.emit(
            Recipient::Player(drawer.clone()),
            ServerEvent::ChooseWord {
                drawer_id: drawer.clone(),
                drawer_name: drawer_name.clone(),
                words: self.word_choices.clone(),
                timeout,
            },
        );
        self.emit(
            Recipient::AllExcept(drawer.clone()),
            ServerEvent::ChooseWord {
                drawer_id: drawer,
                drawer_name,
                words: Vec::new(),
                timeout,
            },
        );
    }

    fn start_drawing(&mut self, word: String, now_ms: u64) {
        let Some(drawer) = self.drawer.clone() else {
            return;
        };
        let draw_time = self.settings.draw_time;
        self.phase = Phase::Drawing;
        self.time_left = draw_time;
        self.revealed.clear();
        self.hints = HintSchedule::new(
            maskable_indices(&word).len(),
            draw_time,
            &self.deps.config.timing.hint_fractions,
        );
        self.hints_given = 0;
        self.correct_guesses = 0;
        self.turn_started_ms = now_ms;
        self.strokes.clear();
        self.word_choices.clear();
        for p in &mut self.players {
            p.has_guessed = false;
        }

        self.recent_words.push_back(word.clone());
        while self.recent_words.len() > self.deps.config.recent_word_memory {
            self.recent_words.pop_front();
        }

        let masked_word = mask(&word, &self.revealed);
        self.word = Some(word.clone());
        let drawer_name = self.name_of(&drawer);
        tracing::debug!(room = %self.code, drawer = %drawer, "turn started");
        self.emit(Recipient::Player(drawer.clone()), ServerEvent::Word { word });
        self.emit(Recipient::All, ServerEvent::ClearCanvas);
        self.emit(
            Recipient::All,
            ServerEvent::TurnStart {
                drawer_id: drawer,
                drawer_name,
                masked_word,
                draw_time,
                round: self.round,
            },
        );
    }

    fn end_turn(&mut self, reason: TurnEndReason, now_ms: u64) {
        let word = self.word.clone();
        self.phase = Phase::RoundEnd;
        self.time_left = self.deps.config.timing.round_end_secs;
        self.drawer = None;
        self.word_choices.clear();

        let scores = self
            .players
            .iter()
            .filter(|p| p.plays())
            .map(|p| ScoreLine {
                player_id: p.id.clone(),
                name: p.name.clone(),
                score: p.score,
                round_score: p.round_score,
            })
            .collect();
        tracing::debug!(room = %self.code, ?reason, "turn ended");
        self.emit(
            Recipient::All,
            ServerEvent::TurnEnd {
                word: word.clone(),
                reason,
                scores,
            },
        );
        if let Some(word) = word {
            self.system_message(format!("The word was {word}"), now_ms);
        }
    }

    /// Leaves `roundEnd`: next drawer, next round, or game end.
    fn advance(&mut self) {
        if self.playing_count() < 2 {
            return self.end_game();
        }
        if let Some(drawer) = self.next_drawer() {
            return self.start_choosing(drawer);
        }

        // Everyone drew: the round is complete.
        let standings = self.standings();
        self.emit(
            Recipient::All,
            ServerEvent::RoundEnd {
                round: self.round,
                standings,
            },
        );
        self.round += 1;
        self.drawn.clear();
        if self.round > self.settings.max_rounds {
            return self.end_game();
        }
        match self.next_drawer() {
            Some(drawer) => self.start_choosing(drawer),
            None => self.end_game(),
        }
    }

    fn end_game(&mut self) {
        self.phase = Phase::GameEnd;
        self.time_left = 0;
        self.drawer = None;
        self.word = None;
        self.word_choices.clear();
        let standings = self.standings();
        tracing::info!(
            room = %self.code,
            winner = standings.first().map(|s| s.name.as_str()),
            "game ended"
        );
        self.emit(Recipient::All, ServerEvent::Ended { standings });
    }

    // -- helpers ------------------------------------------------------------

    fn emit(&mut self, to: Recipient, event: ServerEvent) {
        self.outbox.push((to, event));
    }

    fn broadcast_sync(&mut self) {
        let ids: Vec<PlayerId> = self.players.iter().map(|p| p.id.clone()).collect();
        for id in ids {
            self.broadcast_sync_to(&id);
        }
    }

    fn broadcast_sync_to(&mut self, id: &PlayerId) {
        let snapshot = self.snapshot_for(id);
        self.emit(Recipient::Player(id.clone()), ServerEvent::Sync(Box::new(snapshot)));
    }

    fn index_of(&self, id: &PlayerId) -> Result<usize, RoomError> {
        self.players
            .iter()
            .position(|p| &p.id == id)
            .ok_or_else(|| RoomError::PlayerNotFound(id.clone()))
    }

    fn name_of(&self, id: &PlayerId) -> String {
        self.player(id).map(|p| p.name.clone()).unwrap_or_default()
    }

    fn find_by_name(&self, name: &str) -> Option<&Player> {
        let wanted = normalize(name);
        self.players.iter().find(|p| normalize(&p.name) == wanted)
    }

    fn require_host(&self, player: &PlayerId) -> Result<(), RoomError> {
        match self.player(player) {
            Some(p) if p.is_host => Ok(()),
            Some(_) => Err(RoomError::NotPermitted("only the host can do that".into())),
            None => Err(RoomError::PlayerNotFound(player.clone())),
        }
    }

    fn require_phase(&self, expected: Phase, message: &str) -> Result<(), RoomError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(RoomError::InvalidPhase(format!("{message} (phase is {})", self.phase)))
        }
    }

    /// Non-spectators, connected or not.
    fn playing_count(&self) -> usize {
        self.players.iter().filter(|p| p.plays()).count()
    }

    /// First connected non-spectator in join order who has not drawn yet
    /// this round.
    fn next_drawer(&self) -> Option<PlayerId> {
        self.players
            .iter()
            .find(|p| p.plays() && p.is_connected && !self.drawn.contains(&p.id))
            .map(|p| p.id.clone())
    }

    /// Every connected guesser has found the word.
    fn all_guessed(&self) -> bool {
        let mut guessers = self
            .players
            .iter()
            .filter(|p| p.plays() && p.is_connected && self.drawer.as_ref() != Some(&p.id))
            .peekable();
        guessers.peek().is_some() && guessers.all(|p| p.has_guessed)
    }

    /// The drawer plus everyone who already guessed.
    fn knowing_circle(&self) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| p.has_guessed || self.drawer.as_ref() == Some(&p.id))
            .map(|p| p.id.clone())
            .collect()
    }

    fn chat_line(&self, index: usize, text: &str, is_correct: bool, is_close: bool, now_ms: u64) -> ChatMessage {
        let player = &self.players[index];
        ChatMessage {
            id: Ulid::new().to_string(),
            player_id: Some(player.id.clone()),
            player_name: player.name.clone(),
            text: text.to_string(),
            is_correct,
            is_close,
            is_system: false,
            timestamp: now_ms as i64,
        }
    }

    fn system_line(&self, text: String, now_ms: u64) -> ChatMessage {
        ChatMessage {
            id: Ulid::new().to_string(),
            player_id: None,
            player_name: "system".into(),
            text,
            is_correct: false,
            is_close: false,
            is_system: true,
            timestamp: now_ms as i64,
        }
    }

    /// Logs and broadcasts a system line everyone may see.
    fn system_message(&mut self, text: String, now_ms: u64) {
        let message = self.system_line(text, now_ms);
        self.log_chat(message.clone(), None);
        self.emit(Recipient::All, ServerEvent::Chat(message));
    }

    fn log_chat(&mut self, message: ChatMessage, audience: Option<Vec<PlayerId>>) {
        if self.chat.len() == CHAT_LOG_CAPACITY {
            self.chat.pop_front();
        }
        self.chat.push_back(LoggedChat { message, audience });
    }
}

fn tag_list(tags: &BTreeSet<EvidenceTag>) -> String {
    tags.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    const T0: u64 = 1_700_000_000_000;

    fn deps_with(config: GameConfig) -> RoomDeps {
        RoomDeps {
            config: Arc::new(config),
            words: Arc::new(WordBank::builtin()),
            moderation: Moderation::default(),
        }
    }

    fn room_with(config: GameConfig) -> GameRoom {
        GameRoom::new(
            RoomCode::parse("AB12CD").unwrap(),
            RoomSettings::default(),
            deps_with(config),
            StdRng::seed_from_u64(7),
            T0,
        )
    }

    fn pid(id: &str) -> PlayerId {
        PlayerId::new(id)
    }

    fn chat(text: &str) -> ClientIntent {
        ClientIntent::Chat {
            text: text.into(),
            signals: ClientSignals::default(),
        }
    }

    /// Alice (host) and Bob seated, outbox cleared.
    fn two_players() -> GameRoom {
        let mut room = room_with(GameConfig::default());
        room.add_player(pid("alice"), "Alice", false, T0).unwrap();
        room.add_player(pid("bob"), "Bob", false, T0).unwrap();
        room.drain_outbox();
        room
    }

    /// Game started and Alice drawing "chat".
    fn drawing_chat() -> GameRoom {
        let mut room = two_players();
        room.handle_intent(&pid("alice"), ClientIntent::StartGame, T0).unwrap();
        room.word_choices = vec!["chat".into(), "dog".into(), "house".into()];
        room.handle_intent(&pid("alice"), ClientIntent::SelectWord { word: "chat".into() }, T0)
            .unwrap();
        room.drain_outbox();
        room
    }

    fn events_for(outbox: &[(Recipient, ServerEvent)], who: &PlayerId) -> Vec<ServerEvent> {
        outbox
            .iter()
            .filter(|(to, _)| to.includes(who))
            .map(|(_, e)| e.clone())
            .collect()
    }

    fn hosts(room: &GameRoom) -> usize {
        room.players().iter().filter(|p| p.is_host).count()
    }

    #[test]
    fn test_add_player_first_is_host() {
        let room = two_players();
        assert_eq!(room.host().map(|p| p.id.clone()), Some(pid("alice")));
        assert_eq!(hosts(&room), 1);
        assert_ne!(room.players()[0].avatar_color, room.players()[1].avatar_color);
    }

    #[test]
    fn test_add_player_rejects_bad_name_and_duplicates() {
        let mut room = two_players();
        assert!(matches!(
            room.add_player(pid("c"), "x", false, T0),
            Err(RoomError::Validation(_))
        ));
        assert!(matches!(
            room.add_player(pid("c"), "alice", false, T0),
            Err(RoomError::Validation(_))
        ));
        assert!(matches!(
            room.add_player(pid("bob"), "Robert", false, T0),
            Err(RoomError::AlreadyInRoom(..))
        ));
    }

    #[test]
    fn test_add_player_room_full() {
        let mut room = two_players();
        room.settings.max_players = 2;
        assert!(matches!(
            room.add_player(pid("carol"), "Carol", false, T0),
            Err(RoomError::RoomFull(_))
        ));
    }

    #[test]
    fn test_add_player_mid_game_rejected() {
        let mut room = drawing_chat();
        let err = room.add_player(pid("carol"), "Carol", false, T0).unwrap_err();
        assert_eq!(err.kind(), scribble_protocol::ErrorKind::Phase);
    }

    #[test]
    fn test_add_player_banned_rejected() {
        let mut room = two_players();
        room.deps.moderation.ban(NewBan {
            player_id: pid("carol"),
            player_name: "Carol".into(),
            reason: "test".into(),
            issued_by: IssuedBy::Admin,
            duration_secs: None,
            evidence: BTreeSet::new(),
            prior_warnings: 0,
        });
        assert_eq!(
            room.add_player(pid("carol"), "Carol", false, T0),
            Err(RoomError::Banned(pid("carol")))
        );
    }

    #[test]
    fn test_start_game_requires_host_and_two_players() {
        let mut room = room_with(GameConfig::default());
        room.add_player(pid("alice"), "Alice", false, T0).unwrap();
        assert!(matches!(
            room.handle_intent(&pid("alice"), ClientIntent::StartGame, T0),
            Err(RoomError::Validation(_))
        ));
        room.add_player(pid("bob"), "Bob", false, T0).unwrap();
        assert!(matches!(
            room.handle_intent(&pid("bob"), ClientIntent::StartGame, T0),
            Err(RoomError::NotPermitted(_))
        ));
    }

    #[test]
    fn test_start_game_offers_three_words_to_drawer_only() {
        let mut room = two_players();
        room.handle_intent(&pid("alice"), ClientIntent::StartGame, T0).unwrap();

        assert_eq!(room.phase(), Phase::Choosing);
        assert_eq!(room.drawer(), Some(&pid("alice")));
        assert_eq!(room.round(), 1);

        let outbox = room.drain_outbox();
        let offered = |who: &PlayerId| {
            events_for(&outbox, who).into_iter().find_map(|e| match e {
                ServerEvent::ChooseWord { words, .. } => Some(words),
                _ => None,
            })
        };
        let alice_words = offered(&pid("alice")).unwrap();
        assert_eq!(alice_words.len(), 3);
        let distinct: HashSet<&String> = alice_words.iter().collect();
        assert_eq!(distinct.len(), 3);
        assert_eq!(offered(&pid("bob")), Some(vec![]));
        assert!(room.snapshot_for(&pid("bob")).word_choices.is_empty());
    }

    #[test]
    fn test_select_word_starts_drawing_with_masked_word() {
        let room = drawing_chat();
        assert_eq!(room.phase(), Phase::Drawing);
        assert_eq!(room.time_left(), room.settings().draw_time);

        let bob = room.snapshot_for(&pid("bob"));
        assert_eq!(bob.masked_word, "____");
        assert_eq!(bob.word, None);
        let alice = room.snapshot_for(&pid("alice"));
        assert_eq!(alice.word.as_deref(), Some("chat"));
    }

    #[test]
    fn test_select_word_not_offered_or_not_drawer() {
        let mut room = two_players();
        room.handle_intent(&pid("alice"), ClientIntent::StartGame, T0).unwrap();
        room.word_choices = vec!["chat".into(), "dog".into(), "house".into()];
        assert!(matches!(
            room.handle_intent(&pid("alice"), ClientIntent::SelectWord { word: "zebra".into() }, T0),
            Err(RoomError::Validation(_))
        ));
        assert!(matches!(
            room.handle_intent(&pid("bob"), ClientIntent::SelectWord { word: "chat".into() }, T0),
            Err(RoomError::NotPermitted(_))
        ));
    }

    #[test]
    fn test_choose_timeout_auto_picks_first_word() {
        let mut room = two_players();
        room.handle_intent(&pid("alice"), ClientIntent::StartGame, T0).unwrap();
        let first = room.word_choices()[0].clone();
        for _ in 0..room.deps.config.timing.choose_secs {
            room.tick(T0);
        }
        assert_eq!(room.phase(), Phase::Drawing);
        assert_eq!(room.word(), Some(first.as_str()));
    }

    #[test]
    fn test_correct_guess_scores_and_hides_the_word() {
        let mut room = drawing_chat();

        room.handle_intent(&pid("bob"), chat("Chat"), T0 + 5_000).unwrap();

        let bob = room.player(&pid("bob")).unwrap();
        assert!(bob.has_guessed);
        assert_eq!(bob.score, room.deps.config.scoring.first_guess_points);
        let alice = room.player(&pid("alice")).unwrap();
        assert_eq!(alice.score, room.deps.config.scoring.drawer_points_per_guess);

        let outbox = room.drain_outbox();
        let leaked = outbox.iter().any(|(_, e)| {
            matches!(e, ServerEvent::Chat(m) if !m.is_system && m.text.eq_ignore_ascii_case("chat"))
        });
        assert!(!leaked, "the raw guess must not be relayed");
        assert!(outbox.iter().any(|(_, e)| {
            matches!(e, ServerEvent::Chat(m) if m.is_system && m.text == "Bob found it")
        }));
        // Only guesser left, so the turn is over.
        assert_eq!(room.phase(), Phase::RoundEnd);
    }

    #[test]
    fn test_correct_guess_only_scores_once() {
        let mut room = two_players();
        room.add_player(pid("carol"), "Carol", false, T0).unwrap();
        room.handle_intent(&pid("alice"), ClientIntent::StartGame, T0).unwrap();
        room.word_choices = vec!["chat".into()];
        room.handle_intent(&pid("alice"), ClientIntent::SelectWord { word: "chat".into() }, T0)
            .unwrap();

        room.handle_intent(&pid("bob"), chat("chat"), T0 + 3_000).unwrap();
        let after_first = room.player(&pid("bob")).unwrap().score;
        room.handle_intent(&pid("bob"), chat("chat"), T0 + 6_000).unwrap();

        assert_eq!(room.player(&pid("bob")).unwrap().score, after_first);
        assert_eq!(room.phase(), Phase::Drawing);
    }

    #[test]
    fn test_first_guesser_outscores_later_guesser() {
        let mut room = two_players();
        room.add_player(pid("carol"), "Carol", false, T0).unwrap();
        room.handle_intent(&pid("alice"), ClientIntent::StartGame, T0).unwrap();
        room.word_choices = vec!["chat".into()];
        room.handle_intent(&pid("alice"), ClientIntent::SelectWord { word: "chat".into() }, T0)
            .unwrap();

        for _ in 0..10 {
            room.tick(T0);
        }
        room.handle_intent(&pid("bob"), chat("chat"), T0 + 10_000).unwrap();
        room.handle_intent(&pid("carol"), chat("chat"), T0 + 10_500).unwrap();

        let bob = room.player(&pid("bob")).unwrap().score;
        let carol = room.player(&pid("carol")).unwrap().score;
        assert!(bob >= carol);
        assert_eq!(room.phase(), Phase::RoundEnd);
    }

    #[test]
    fn test_close_guess_goes_only_to_author() {
        let mut room = drawing_chat();
        room.handle_intent(&pid("bob"), chat("chart"), T0 + 2_000).unwrap();

        let outbox = room.drain_outbox();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].0, Recipient::Player(pid("bob")));
        assert!(matches!(&outbox[0].1, ServerEvent::Chat(m) if m.is_close));
        assert!(room.snapshot_for(&pid("alice")).chat.iter().all(|m| !m.is_close));
    }

    #[test]
    fn test_drawer_chat_reaches_only_knowing_players() {
        let mut room = two_players();
        room.add_player(pid("carol"), "Carol", false, T0).unwrap();
        room.handle_intent(&pid("alice"), ClientIntent::StartGame, T0).unwrap();
        room.word_choices = vec!["chat".into()];
        room.handle_intent(&pid("alice"), ClientIntent::SelectWord { word: "chat".into() }, T0)
            .unwrap();
        room.handle_intent(&pid("bob"), chat("chat"), T0 + 2_000).unwrap();
        room.drain_outbox();

        room.handle_intent(&pid("bob"), chat("nice drawing"), T0 + 4_000).unwrap();

        let outbox = room.drain_outbox();
        assert!(events_for(&outbox, &pid("carol")).is_empty());
        assert_eq!(events_for(&outbox, &pid("alice")).len(), 1);
    }

    #[test]
    fn test_stroke_only_from_drawer_while_drawing() {
        let mut room = drawing_chat();
        let stroke = DrawStroke {
            points: vec![scribble_protocol::Point { x: 1.0, y: 1.0 }],
            color: "#000".into(),
            size: 4.0,
            tool: scribble_protocol::Tool::Brush,
        };
        let err = room
            .handle_intent(&pid("bob"), ClientIntent::Stroke(stroke.clone()), T0)
            .unwrap_err();
        assert_eq!(err.kind(), scribble_protocol::ErrorKind::Phase);

        room.handle_intent(&pid("alice"), ClientIntent::Stroke(stroke.clone()), T0).unwrap();
        room.handle_intent(&pid("alice"), ClientIntent::Stroke(stroke), T0).unwrap();
        room.handle_intent(&pid("alice"), ClientIntent::Undo, T0).unwrap();
        assert_eq!(room.strokes().len(), 1);
        room.handle_intent(&pid("alice"), ClientIntent::ClearCanvas, T0).unwrap();
        assert!(room.strokes().is_empty());
    }

    #[test]
    fn test_time_up_ends_turn_and_reveals_word() {
        let mut room = drawing_chat();
        let draw_time = room.settings().draw_time;
        for _ in 0..draw_time {
            room.tick(T0);
        }
        assert_eq!(room.phase(), Phase::RoundEnd);
        let outbox = room.drain_outbox();
        assert!(outbox.iter().any(|(_, e)| matches!(
            e,
            ServerEvent::TurnEnd { word: Some(w), reason: TurnEndReason::TimeUp, .. } if w == "chat"
        )));
        let hints = outbox
            .iter()
            .filter(|(_, e)| matches!(e, ServerEvent::Hint { .. }))
            .count();
        assert_eq!(hints, 2);
        assert_eq!(room.snapshot_for(&pid("bob")).word.as_deref(), Some("chat"));
    }

    #[test]
    fn test_rotation_advances_round_and_ends_game() {
        let mut config = GameConfig::default();
        config.timing.round_end_secs = 1;
        let mut room = room_with(config);
        room.settings.max_rounds = 1;
        room.add_player(pid("alice"), "Alice", false, T0).unwrap();
        room.add_player(pid("bob"), "Bob", false, T0).unwrap();
        room.handle_intent(&pid("alice"), ClientIntent::StartGame, T0).unwrap();

        // Alice's turn times out without a choice or a guess.
        let turn = room.deps.config.timing.choose_secs + room.settings().draw_time;
        for _ in 0..turn {
            room.tick(T0);
        }
        room.tick(T0);
        assert_eq!(room.phase(), Phase::Choosing);
        assert_eq!(room.drawer(), Some(&pid("bob")));

        for _ in 0..turn {
            room.tick(T0);
        }
        room.drain_outbox();
        room.tick(T0);
        assert_eq!(room.phase(), Phase::GameEnd);
        let outbox = room.drain_outbox();
        assert!(outbox.iter().any(|(_, e)| matches!(e, ServerEvent::RoundEnd { round: 1, .. })));
        assert!(outbox.iter().any(|(_, e)| matches!(e, ServerEvent::Ended { .. })));
    }

    #[test]
    fn test_next_round_skips_delay() {
        let mut room = drawing_chat();
        room.handle_intent(&pid("bob"), chat("chat"), T0 + 1_000).unwrap();
        assert_eq!(room.phase(), Phase::RoundEnd);
        room.handle_intent(&pid("alice"), ClientIntent::NextRound, T0).unwrap();
        assert_eq!(room.phase(), Phase::Choosing);
        assert_eq!(room.drawer(), Some(&pid("bob")));
    }

    #[test]
    fn test_standings_tie_keeps_join_order() {
        let mut room = two_players();
        room.add_player(pid("carol"), "Carol", false, T0).unwrap();
        room.players[0].score = 50;
        room.players[1].score = 80;
        room.players[2].score = 50;
        let ranked: Vec<String> = room.standings().into_iter().map(|s| s.name).collect();
        assert_eq!(ranked, vec!["Bob", "Alice", "Carol"]);
    }

    #[test]
    fn test_host_leaving_migrates_host() {
        let mut room = two_players();
        room.add_player(pid("carol"), "Carol", false, T0).unwrap();
        room.handle_intent(&pid("alice"), ClientIntent::LeaveRoom, T0).unwrap();

        assert_eq!(room.host().map(|p| p.id.clone()), Some(pid("bob")));
        assert_eq!(hosts(&room), 1);
        let outbox = room.drain_outbox();
        assert!(outbox.iter().any(|(_, e)| matches!(
            e,
            ServerEvent::HostChanged { host_id, .. } if *host_id == pid("bob")
        )));
        assert_eq!(
            room.drain_departures(),
            vec![Departure {
                player_id: pid("alice"),
                reason: "left".into()
            }]
        );
    }

    #[test]
    fn test_drawer_disconnect_ends_turn() {
        let mut room = two_players();
        room.add_player(pid("carol"), "Carol", false, T0).unwrap();
        room.handle_intent(&pid("alice"), ClientIntent::StartGame, T0).unwrap();
        room.word_choices = vec!["chat".into()];
        room.handle_intent(&pid("alice"), ClientIntent::SelectWord { word: "chat".into() }, T0)
            .unwrap();
        room.drain_outbox();

        room.disconnect(&pid("alice"), T0).unwrap();

        assert_eq!(room.phase(), Phase::RoundEnd);
        let outbox = room.drain_outbox();
        assert!(outbox.iter().any(|(_, e)| matches!(
            e,
            ServerEvent::TurnEnd { reason: TurnEndReason::DrawerLeft, .. }
        )));
    }

    #[test]
    fn test_drawer_dropping_while_choosing_withholds_word() {
        for leave in [false, true] {
            let mut room = two_players();
            room.add_player(pid("carol"), "Carol", false, T0).unwrap();
            room.handle_intent(&pid("alice"), ClientIntent::StartGame, T0).unwrap();
            assert_eq!(room.phase(), Phase::Choosing);
            room.drain_outbox();

            if leave {
                room.remove_player(&pid("alice"), "left", T0).unwrap();
            } else {
                room.disconnect(&pid("alice"), T0).unwrap();
            }

            assert_eq!(room.phase(), Phase::RoundEnd);
            let outbox = room.drain_outbox();
            assert!(outbox.iter().any(|(_, e)| matches!(
                e,
                ServerEvent::TurnEnd { word: None, reason: TurnEndReason::DrawerLeft, .. }
            )));
        }
    }

    #[test]
    fn test_reconnect_restores_without_changing_score() {
        let mut room = drawing_chat();
        room.handle_intent(&pid("bob"), chat("chat"), T0 + 1_000).unwrap();
        let score = room.player(&pid("bob")).unwrap().score;
        let round = room.round();

        room.disconnect(&pid("bob"), T0).unwrap();
        assert!(!room.player(&pid("bob")).unwrap().is_connected);
        room.reconnect(&pid("bob")).unwrap();

        let bob = room.player(&pid("bob")).unwrap();
        assert!(bob.is_connected);
        assert_eq!(bob.score, score);
        assert_eq!(room.round(), round);
        assert!(room.player(&pid("alice")).unwrap().is_host);
    }

    #[test]
    fn test_dropping_below_two_players_ends_game() {
        let mut room = drawing_chat();
        room.handle_intent(&pid("bob"), ClientIntent::LeaveRoom, T0).unwrap();
        assert_eq!(room.phase(), Phase::GameEnd);
    }

    #[test]
    fn test_kick_and_ban_are_host_only_and_spare_the_host() {
        let mut room = two_players();
        room.add_player(pid("carol"), "Carol", false, T0).unwrap();
        assert!(matches!(
            room.handle_intent(&pid("bob"), ClientIntent::Kick { target: pid("carol") }, T0),
            Err(RoomError::NotPermitted(_))
        ));
        assert!(matches!(
            room.handle_intent(&pid("alice"), ClientIntent::Kick { target: pid("alice") }, T0),
            Err(RoomError::NotPermitted(_))
        ));
        assert!(matches!(
            room.handle_intent(&pid("alice"), ClientIntent::Kick { target: pid("zed") }, T0),
            Err(RoomError::PlayerNotFound(_))
        ));

        room.handle_intent(
            &pid("alice"),
            ClientIntent::Ban {
                target: pid("carol"),
                reason: None,
            },
            T0,
        )
        .unwrap();
        assert!(room.player(&pid("carol")).is_none());
        assert!(room.deps.moderation.is_banned(&pid("carol")));
    }

    #[test]
    fn test_report_command_files_report() {
        let mut room = two_players();
        room.handle_intent(&pid("alice"), chat("/report Bob rude words"), T0).unwrap();

        let reports = room.deps.moderation.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].reported_id, pid("bob"));
        assert_eq!(reports[0].reason, "rude words");
        let outbox = room.drain_outbox();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].0, Recipient::Player(pid("alice")));
    }

    #[test]
    fn test_unknown_command_and_unknown_name_rejected() {
        let mut room = two_players();
        assert!(matches!(
            room.handle_intent(&pid("alice"), chat("/dance"), T0),
            Err(RoomError::Validation(_))
        ));
        assert!(matches!(
            room.handle_intent(&pid("alice"), chat("/report Nobody spam"), T0),
            Err(RoomError::UnknownPlayerName(_))
        ));
    }

    #[test]
    fn test_spam_burst_bans_with_spam_intense_only() {
        let mut room = two_players();
        let mut result = Ok(());
        for i in 0..13u64 {
            result = room.handle_intent(&pid("bob"), chat(&format!("hello {i}")), T0 + i * 350);
        }
        assert_eq!(result, Err(RoomError::Trust(vec![EvidenceTag::SpamIntense])));
        assert!(room.player(&pid("bob")).is_none());

        let ban = room.deps.moderation.active_ban(&pid("bob")).unwrap();
        assert_eq!(ban.evidence, BTreeSet::from([EvidenceTag::SpamIntense]));
        let decision = room.deps.moderation.contest(&pid("bob")).unwrap();
        assert_eq!(decision.verdict, scribble_protocol::AppealVerdict::Overturned);
    }

    #[test]
    fn test_warn_mutes_and_drops_message() {
        let mut room = two_players();
        room.handle_intent(&pid("bob"), chat("<script>alert(1)</script>"), T0).unwrap();

        let bob = room.player(&pid("bob")).unwrap();
        assert!(bob.is_muted);
        assert_eq!(bob.strikes, 1);
        let outbox = room.drain_outbox();
        assert!(events_for(&outbox, &pid("alice")).is_empty());
    }

    #[test]
    fn test_settings_update_validation() {
        let mut room = two_players();
        let bad = RoomSettings {
            draw_time: 5,
            ..RoomSettings::default()
        };
        assert!(matches!(
            room.handle_intent(&pid("alice"), ClientIntent::UpdateSettings(bad), T0),
            Err(RoomError::Validation(_))
        ));
        let good = RoomSettings {
            draw_time: 60,
            ..RoomSettings::default()
        };
        room.handle_intent(&pid("alice"), ClientIntent::UpdateSettings(good), T0).unwrap();
        assert_eq!(room.settings().draw_time, 60);
    }

    #[test]
    fn test_play_again_resets_to_waiting() {
        let mut room = drawing_chat();
        room.handle_intent(&pid("bob"), chat("chat"), T0 + 1_000).unwrap();
        room.end_game();
        room.handle_intent(&pid("alice"), ClientIntent::PlayAgain, T0).unwrap();
        assert_eq!(room.phase(), Phase::Waiting);
        assert!(room.players().iter().all(|p| p.score == 0));
        assert_eq!(room.round(), 0);
    }

    #[test]
    fn test_spectator_never_draws() {
        let mut room = two_players();
        room.add_player(pid("sam"), "Sam", true, T0).unwrap();
        room.handle_intent(&pid("alice"), ClientIntent::StartGame, T0).unwrap();
        room.drawn.insert(pid("alice"));
        room.drawn.insert(pid("bob"));
        assert_eq!(room.next_drawer(), None);
        assert_eq!(room.standings().len(), 2);
    }
}
