//! The Game Coordinator: a single-writer, per-game actor that owns a
//! `GameState`, runs the phase state machine and question timer, scores
//! answers, persists after every mutation, and synthesizes catch-up
//! messages for reconnecting clients.
//!
//! Every event — an inbound client message, a socket close, a timer tick,
//! a scheduled phase transition — is posted into one `mpsc` mailbox and
//! drained serially by [`run`]. Nothing here ever needs a lock: the actor
//! is the only thing that ever touches `self.state`.

use std::collections::BTreeSet;
use std::time::Duration;

use quizhost_core::{
    game_state::GameState,
    ids::{GamePin, generate_player_id},
    net::{ClientMessage, PodiumPosition, QuestionView, ServerMessage, decode_client_message, encode_server_message},
    phase::Phase,
    player::{self, Player},
    quiz::{self, Quiz},
    scoring,
    time::now_ms,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::persistence::SnapshotStore;
use crate::session_registry::{Role, SessionId, SessionRegistry};

const GAME_STARTING_DELAY_MS: u64 = 3_000;
const NEXT_PHASE_DELAY_MS: u64 = 3_000;
/// Podium reveal delays, in order: position 3 at +1s, position 2 at +3s,
/// position 1 at +5s (§4.4 `showPodium`).
const PODIUM_REVEAL_SCHEDULE: [(u64, PodiumPosition); 3] = [
    (1_000, PodiumPosition::Third),
    (3_000, PodiumPosition::Second),
    (5_000, PodiumPosition::First),
];

pub enum CoordinatorEvent {
    Connect {
        is_host: bool,
        outbound: mpsc::UnboundedSender<String>,
        reply: oneshot::Sender<SessionId>,
    },
    ClientMessage {
        session_id: SessionId,
        raw: String,
    },
    Disconnect {
        session_id: SessionId,
    },
    TimerTick {
        generation: u64,
    },
    Delayed(DelayedTransition),
    Inspect {
        reply: oneshot::Sender<InspectSnapshot>,
    },
}

#[derive(Debug, Clone, Copy)]
pub enum DelayedTransition {
    StartQuestion(usize),
    ShowLeaderboard,
    ShowPodiumPhase,
    PodiumReveal(PodiumPosition),
}

#[derive(Debug, Clone)]
pub struct InspectSnapshot {
    pub game_pin: GamePin,
    pub phase: Phase,
}

/// A cheap, cloneable reference to a running coordinator's mailbox.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<CoordinatorEvent>,
}

impl CoordinatorHandle {
    /// Admit a new socket. Returns `None` only if the coordinator has
    /// already shut down.
    pub async fn connect(&self, is_host: bool, outbound: mpsc::UnboundedSender<String>) -> Option<SessionId> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(CoordinatorEvent::Connect { is_host, outbound, reply })
            .ok()?;
        rx.await.ok()
    }

    pub fn client_message(&self, session_id: SessionId, raw: String) {
        let _ = self.tx.send(CoordinatorEvent::ClientMessage { session_id, raw });
    }

    pub fn disconnect(&self, session_id: SessionId) {
        let _ = self.tx.send(CoordinatorEvent::Disconnect { session_id });
    }

    pub async fn inspect(&self) -> Option<InspectSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(CoordinatorEvent::Inspect { reply }).ok()?;
        rx.await.ok()
    }
}

struct Ticker {
    handle: JoinHandle<()>,
    generation: u64,
}

pub struct Coordinator {
    game_id: String,
    state: GameState,
    store: SnapshotStore,
    sessions: SessionRegistry,
    self_tx: mpsc::UnboundedSender<CoordinatorEvent>,
    max_players: usize,
    ticker: Option<Ticker>,
    next_generation: u64,
    current_seconds_left: u32,
    /// Set once `try_end_question` has done its scoring/broadcast work for
    /// the current question, reset on `start_question`. This, not ticker
    /// presence, is what makes `try_end_question` idempotent: it must still
    /// run when called with no ticker (timer resume at zero seconds left,
    /// restart-after-eviction past expiry), and must still no-op on a
    /// second call during the 3s delay before the phase actually advances.
    question_ended: bool,
}

impl Coordinator {
    /// Perform the Coordinator's blocking initialization and hand back a
    /// handle only once it's complete (§4.1 `blockConcurrencyWhile`): the
    /// caller cannot race a connect against an in-flight snapshot load
    /// because the load happens here, before the mailbox task starts.
    pub async fn spawn(game_id: String, store: SnapshotStore, max_players: usize) -> CoordinatorHandle {
        let state = Self::load_or_fresh(&game_id, &store).await;
        if let Err(e) = store.save(&game_id, &state).await {
            tracing::warn!(game_id = %game_id, error = %e, "failed to persist initial snapshot");
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = Coordinator {
            game_id,
            state,
            store,
            sessions: SessionRegistry::new(),
            self_tx: tx.clone(),
            max_players,
            ticker: None,
            next_generation: 0,
            current_seconds_left: 0,
            question_ended: false,
        };
        tokio::spawn(coordinator.run(rx));
        CoordinatorHandle { tx }
    }

    async fn load_or_fresh(game_id: &str, store: &SnapshotStore) -> GameState {
        match store.load(game_id).await {
            Ok(Some(mut state)) => {
                state.mark_all_disconnected();
                if state.phase == Phase::Question {
                    let expired = state
                        .question_start_time
                        .zip(state.current_question())
                        .map(|(start, q)| now_ms().saturating_sub(start) >= q.timer_seconds as u64 * 1000)
                        .unwrap_or(false);
                    if expired {
                        Self::apply_scoring_for_current_question(&mut state);
                        state.phase = Phase::Leaderboard;
                    }
                }
                state
            },
            Ok(None) => GameState::fresh(GamePin::generate()),
            Err(e) => {
                tracing::error!(game_id, error = %e, "failed to load snapshot, starting fresh");
                GameState::fresh(GamePin::generate())
            },
        }
    }

    fn apply_scoring_for_current_question(state: &mut GameState) {
        let Some(question) = state.current_question().cloned() else { return };
        let Some(start) = state.question_start_time else { return };
        for player in state.players.values_mut() {
            let points = scoring::score_answer(&question, start, player);
            player.score += points as u64;
        }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<CoordinatorEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle_event(event).await;
        }
        if let Some(ticker) = self.ticker.take() {
            ticker.handle.abort();
        }
    }

    async fn handle_event(&mut self, event: CoordinatorEvent) {
        match event {
            CoordinatorEvent::Connect { is_host, outbound, reply } => {
                let session_id = self.handle_connect(is_host, outbound).await;
                let _ = reply.send(session_id);
            },
            CoordinatorEvent::ClientMessage { session_id, raw } => {
                self.handle_client_message(session_id, &raw).await;
            },
            CoordinatorEvent::Disconnect { session_id } => {
                self.handle_disconnect(session_id).await;
            },
            CoordinatorEvent::TimerTick { generation } => {
                self.handle_timer_tick(generation).await;
            },
            CoordinatorEvent::Delayed(transition) => {
                self.handle_delayed(transition).await;
            },
            CoordinatorEvent::Inspect { reply } => {
                let _ = reply.send(InspectSnapshot {
                    game_pin: self.state.game_pin,
                    phase: self.state.phase,
                });
            },
        }
    }

    async fn persist(&self) {
        if let Err(e) = self.store.save(&self.game_id, &self.state).await {
            tracing::error!(game_id = %self.game_id, error = %e, "failed to persist game state");
        }
    }

    fn send_error(&self, session_id: SessionId, message: impl Into<String>) {
        let msg = ServerMessage::Error { message: message.into() };
        self.sessions.send(session_id, &encode_server_message(&msg));
    }

    fn leaderboard(&self) -> Vec<scoring::LeaderboardEntry> {
        let current_question = self.state.current_question();
        scoring::build_leaderboard(&self.state.players.values().collect::<Vec<_>>(), current_question)
    }

    // -- admission & catch-up (§4.2, §4.6) -----------------------------

    async fn handle_connect(&mut self, is_host: bool, outbound: mpsc::UnboundedSender<String>) -> SessionId {
        let role = if is_host { Role::Host } else { Role::Player(None) };
        let session_id = self.sessions.register(role, outbound);

        if is_host && !self.state.host_connected {
            self.state.host_connected = true;
            if self.state.phase == Phase::Question && self.state.timer_paused {
                self.resume_timer().await;
            }
        }

        self.send_game_state(session_id);
        self.send_catch_up(session_id, is_host).await;
        session_id
    }

    fn send_game_state(&self, session_id: SessionId) {
        let msg = ServerMessage::GameState { state: self.state.clone() };
        self.sessions.send(session_id, &encode_server_message(&msg));
    }

    async fn send_catch_up(&mut self, session_id: SessionId, is_host: bool) {
        match self.state.phase {
            Phase::Lobby | Phase::Finished => {
                if self.state.phase == Phase::Finished {
                    self.send_game_finished(session_id);
                }
            },
            Phase::Question => {
                self.send_question_start(session_id, is_host);
                if self.ticker.is_none() && !self.state.timer_paused {
                    self.restart_timer_after_eviction().await;
                }
                let seconds_left = if self.state.timer_paused {
                    self.state.paused_at_seconds_left.unwrap_or(0)
                } else {
                    self.current_seconds_left
                };
                let msg = ServerMessage::TimerTick { seconds_left };
                self.sessions.send(session_id, &encode_server_message(&msg));
            },
            Phase::Leaderboard => {
                let msg = ServerMessage::LeaderboardUpdate { leaderboard: self.leaderboard() };
                self.sessions.send(session_id, &encode_server_message(&msg));
            },
            Phase::Podium => {
                self.send_podium_catch_up(session_id);
            },
        }
    }

    fn send_question_start(&self, session_id: SessionId, is_host: bool) {
        let Some(question) = self.state.current_question() else { return };
        let msg = ServerMessage::QuestionStart {
            question: QuestionView::for_role(question, is_host),
            question_index: self.state.current_question_index as usize,
            total_questions: self.state.quiz.as_ref().map(|q| q.questions.len()).unwrap_or(0),
        };
        self.sessions.send(session_id, &encode_server_message(&msg));
    }

    fn send_podium_catch_up(&self, session_id: SessionId) {
        let board = self.leaderboard();
        for (position, rank) in [(PodiumPosition::Third, 3u32), (PodiumPosition::Second, 2), (PodiumPosition::First, 1)] {
            let player = board.iter().find(|e| e.rank == rank).cloned();
            let msg = ServerMessage::PodiumReveal { position, player };
            self.sessions.send(session_id, &encode_server_message(&msg));
        }
        self.send_game_finished(session_id);
    }

    fn send_game_finished(&self, session_id: SessionId) {
        let msg = ServerMessage::GameFinished { final_leaderboard: self.leaderboard() };
        self.sessions.send(session_id, &encode_server_message(&msg));
    }

    // -- dispatcher (§4.2) ----------------------------------------------

    async fn handle_client_message(&mut self, session_id: SessionId, raw: &str) {
        let message = match decode_client_message(raw) {
            Ok(m) => m,
            Err(e) => {
                self.send_error(session_id, e);
                return;
            },
        };

        let Some(role) = self.sessions.role_of(session_id).cloned() else {
            return;
        };
        let is_host = matches!(role, Role::Host);

        let requires_host = matches!(
            message,
            ClientMessage::HostCreateQuiz { .. }
                | ClientMessage::HostStartGame
                | ClientMessage::HostNextQuestion
                | ClientMessage::HostShowLeaderboard
                | ClientMessage::HostShowPodium
        );
        if requires_host && !is_host {
            self.send_error(session_id, "this message requires the host role");
            return;
        }
        if !requires_host && is_host {
            self.send_error(session_id, "this message requires the player role");
            return;
        }

        match message {
            ClientMessage::HostCreateQuiz { quiz } => self.handle_create_quiz(session_id, quiz).await,
            ClientMessage::HostStartGame => self.handle_start_game(session_id).await,
            ClientMessage::HostNextQuestion => self.handle_next_question(session_id).await,
            ClientMessage::HostShowLeaderboard => self.show_leaderboard().await,
            ClientMessage::HostShowPodium => self.show_podium().await,
            ClientMessage::PlayerJoin { nickname } => self.handle_player_join(session_id, nickname).await,
            ClientMessage::PlayerRejoin { player_id, nickname } => {
                self.handle_player_rejoin(session_id, player_id, nickname).await
            },
            ClientMessage::PlayerAnswer { question_id, answer_indices } => {
                self.handle_player_answer(session_id, question_id, answer_indices).await
            },
        }
    }

    // -- §4.3 quiz intake -------------------------------------------------

    async fn handle_create_quiz(&mut self, session_id: SessionId, quiz: Quiz) {
        if let Err(e) = quiz::validate_quiz(&quiz) {
            self.send_error(session_id, e.to_string());
            return;
        }
        self.state.quiz = Some(quiz);
        self.persist().await;
        self.sessions
            .broadcast(&encode_server_message(&ServerMessage::GameState { state: self.state.clone() }));
    }

    // -- §4.6 player join / rejoin ----------------------------------------

    async fn handle_player_join(&mut self, session_id: SessionId, nickname: String) {
        if self.state.phase != Phase::Lobby {
            self.send_error(session_id, "players may only join during the lobby phase");
            return;
        }
        let nickname = player::normalize_nickname(&nickname);
        if !player::nickname_len_valid(&nickname) {
            self.send_error(session_id, "nickname must be between 1 and 50 characters");
            return;
        }
        if self
            .state
            .players
            .values()
            .any(|p| player::nicknames_match(&p.nickname, &nickname))
        {
            self.send_error(session_id, "nickname is already taken");
            return;
        }
        if self.state.players.len() >= self.max_players {
            self.send_error(session_id, "this game is full");
            return;
        }

        let id = generate_player_id();
        let new_player = Player::new(id.clone(), nickname);
        self.state.players.insert(id.clone(), new_player.clone());
        self.sessions.identify_player(session_id, id);
        self.persist().await;

        let player_count = self.state.connected_player_count();
        self.sessions.broadcast(&encode_server_message(&ServerMessage::PlayerJoined {
            player: new_player,
            player_count,
        }));
        self.send_game_state(session_id);
    }

    async fn handle_player_rejoin(&mut self, session_id: SessionId, player_id: String, nickname: String) {
        let existing = self.state.players.get(&player_id).cloned();
        match existing {
            None if self.state.phase == Phase::Lobby => {
                self.handle_player_join(session_id, nickname).await;
            },
            None => {
                self.send_error(session_id, "unknown player id");
            },
            Some(existing) if !player::nicknames_match(&existing.nickname, &nickname) => {
                self.send_error(session_id, "nickname does not match this player id");
            },
            Some(_) => {
                if let Some(p) = self.state.players.get_mut(&player_id) {
                    p.connected = true;
                }
                self.sessions.identify_player(session_id, player_id.clone());
                self.persist().await;

                let player = self.state.players.get(&player_id).cloned().unwrap();
                let player_count = self.state.connected_player_count();
                self.sessions.broadcast(&encode_server_message(&ServerMessage::PlayerRejoined {
                    player,
                    player_count,
                }));
                self.send_game_state(session_id);
                self.send_catch_up(session_id, false).await;
            },
        }
    }

    // -- §4.8 player answer ------------------------------------------------

    async fn handle_player_answer(&mut self, session_id: SessionId, question_id: String, answer_indices: BTreeSet<u8>) {
        if self.state.phase != Phase::Question {
            self.send_error(session_id, "no question is currently active");
            return;
        }
        let Some(Role::Player(Some(player_id))) = self.sessions.role_of(session_id).cloned() else {
            self.send_error(session_id, "join the game before answering");
            return;
        };
        let Some(current_question) = self.state.current_question().cloned() else {
            self.send_error(session_id, "no question is currently active");
            return;
        };
        if question_id != current_question.id {
            self.send_error(session_id, "answer does not match the current question");
            return;
        }
        if answer_indices.is_empty() || answer_indices.iter().any(|&i| i > 3) {
            self.send_error(session_id, "answerIndices must be a non-empty subset of 0..=3");
            return;
        }
        let Some(player) = self.state.players.get_mut(&player_id) else {
            self.send_error(session_id, "unknown player");
            return;
        };
        if player.has_answered(&current_question.id) {
            self.send_error(session_id, "you have already answered this question");
            return;
        }

        player.answers.insert(
            current_question.id.clone(),
            player::Answer { answer_indices, timestamp: now_ms() },
        );
        self.persist().await;
        self.sessions
            .broadcast(&encode_server_message(&ServerMessage::AnswerReceived { player_id }));

        if self.ticker.is_some()
            && !self.state.timer_paused
            && self.state.all_connected_answered(&current_question.id)
        {
            self.try_end_question().await;
        }
    }

    // -- §4.7 host commands -------------------------------------------------

    async fn handle_start_game(&mut self, session_id: SessionId) {
        let has_quiz = self.state.quiz.as_ref().is_some_and(|q| !q.questions.is_empty());
        if !has_quiz {
            self.send_error(session_id, "no quiz with questions has been loaded");
            return;
        }
        if self.state.connected_player_count() == 0 {
            self.send_error(session_id, "at least one connected player is required to start");
            return;
        }
        self.sessions.broadcast(&encode_server_message(&ServerMessage::GameStarting));
        self.schedule_delayed(GAME_STARTING_DELAY_MS, DelayedTransition::StartQuestion(0));
    }

    async fn handle_next_question(&mut self, session_id: SessionId) {
        if self.state.phase != Phase::Leaderboard {
            self.send_error(session_id, "can only advance from the leaderboard phase");
            return;
        }
        let next = (self.state.current_question_index + 1) as usize;
        let has_next = self.state.quiz.as_ref().is_some_and(|q| next < q.questions.len());
        if has_next {
            self.start_question(next).await;
        } else {
            self.show_podium().await;
        }
    }

    // -- §4.4 timer engine & phase transitions -------------------------------

    async fn start_question(&mut self, index: usize) {
        let Some(timer_seconds) = self
            .state
            .quiz
            .as_ref()
            .and_then(|q| q.questions.get(index))
            .map(|q| q.timer_seconds)
        else {
            return;
        };
        self.state.phase = Phase::Question;
        self.state.current_question_index = index as i64;
        self.state.question_start_time = Some(now_ms());
        self.state.timer_paused = false;
        self.state.paused_at_seconds_left = None;
        self.question_ended = false;
        self.persist().await;

        let total_questions = self.state.quiz.as_ref().map(|q| q.questions.len()).unwrap_or(0);
        let question = self.state.current_question().cloned();
        if let Some(question) = question {
            self.sessions.broadcast_filtered(|is_host| {
                encode_server_message(&ServerMessage::QuestionStart {
                    question: QuestionView::for_role(&question, is_host),
                    question_index: index,
                    total_questions,
                })
            });
        }

        self.current_seconds_left = timer_seconds;
        self.start_ticker();
    }

    fn start_ticker(&mut self) {
        if let Some(old) = self.ticker.take() {
            old.handle.abort();
        }
        self.next_generation += 1;
        let generation = self.next_generation;
        let tx = self.self_tx.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.tick().await; // first tick fires immediately; discard it
            loop {
                interval.tick().await;
                if tx.send(CoordinatorEvent::TimerTick { generation }).is_err() {
                    break;
                }
            }
        });
        self.ticker = Some(Ticker { handle, generation });
    }

    fn cancel_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.handle.abort();
        }
    }

    async fn handle_timer_tick(&mut self, generation: u64) {
        let Some(ticker) = &self.ticker else { return };
        if ticker.generation != generation {
            return; // stale tick from an already-cancelled ticker
        }
        if self.state.timer_paused {
            return;
        }
        self.current_seconds_left = self.current_seconds_left.saturating_sub(1);
        if self.current_seconds_left > 0 {
            let msg = ServerMessage::TimerTick { seconds_left: self.current_seconds_left };
            self.sessions.broadcast(&encode_server_message(&msg));
        } else {
            self.try_end_question().await;
        }
    }

    async fn pause_timer(&mut self) {
        self.cancel_ticker();
        self.state.timer_paused = true;
        self.state.paused_at_seconds_left = Some(self.current_seconds_left);
        self.persist().await;
    }

    async fn resume_timer(&mut self) {
        if !self.state.timer_paused || self.state.phase != Phase::Question {
            return;
        }
        let seconds_left = self.state.paused_at_seconds_left.unwrap_or(0);
        if seconds_left == 0 {
            self.state.timer_paused = false;
            self.state.paused_at_seconds_left = None;
            self.try_end_question().await;
            return;
        }
        self.state.timer_paused = false;
        self.state.paused_at_seconds_left = None;
        self.current_seconds_left = seconds_left;
        self.persist().await;
        self.start_ticker();
        self.sessions.broadcast(&encode_server_message(&ServerMessage::GameResumed));
        self.sessions
            .broadcast(&encode_server_message(&ServerMessage::TimerTick { seconds_left }));
    }

    async fn restart_timer_after_eviction(&mut self) {
        let Some(start) = self.state.question_start_time else { return };
        let Some(timer_seconds) = self.state.current_question().map(|q| q.timer_seconds) else { return };
        let elapsed_secs = now_ms().saturating_sub(start) / 1000;
        let remaining = (timer_seconds as u64).saturating_sub(elapsed_secs);
        if remaining > 0 {
            self.current_seconds_left = remaining as u32;
            self.start_ticker();
        } else {
            self.try_end_question().await;
        }
    }

    /// Cancelling the ticker is always safe to repeat (`Option::take` on an
    /// already-`None` ticker is a no-op), so it happens unconditionally.
    /// The scoring/broadcast work below is guarded by `question_ended`
    /// instead: phase stays `Question` for the 3s delay between this call
    /// and the scheduled `ShowLeaderboard`/`ShowPodiumPhase` transition, so
    /// a second call during that window (another client reconnecting mid-
    /// gap, a stale tick) must still see the question as already handled
    /// even though no ticker is running by then.
    async fn try_end_question(&mut self) {
        self.cancel_ticker();
        if self.state.phase != Phase::Question || self.question_ended {
            return;
        }
        self.question_ended = true;

        let Some(question) = self.state.current_question().cloned() else { return };
        Self::apply_scoring_for_current_question(&mut self.state);
        self.persist().await;

        let correct_indices = question.correct_indices.clone();
        let scores = self.leaderboard();
        self.sessions
            .broadcast(&encode_server_message(&ServerMessage::QuestionEnd { correct_indices, scores }));

        let is_last = self
            .state
            .quiz
            .as_ref()
            .map(|q| self.state.current_question_index as usize + 1 >= q.questions.len())
            .unwrap_or(true);
        if is_last {
            self.schedule_delayed(NEXT_PHASE_DELAY_MS, DelayedTransition::ShowPodiumPhase);
        } else {
            self.schedule_delayed(NEXT_PHASE_DELAY_MS, DelayedTransition::ShowLeaderboard);
        }
    }

    async fn show_leaderboard(&mut self) {
        self.state.phase = Phase::Leaderboard;
        self.persist().await;
        self.sessions
            .broadcast(&encode_server_message(&ServerMessage::LeaderboardUpdate { leaderboard: self.leaderboard() }));
    }

    async fn show_podium(&mut self) {
        self.state.phase = Phase::Podium;
        self.persist().await;
        for (delay_ms, position) in PODIUM_REVEAL_SCHEDULE {
            self.schedule_delayed(delay_ms, DelayedTransition::PodiumReveal(position));
        }
    }

    fn schedule_delayed(&self, delay_ms: u64, transition: DelayedTransition) {
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let _ = tx.send(CoordinatorEvent::Delayed(transition));
        });
    }

    async fn handle_delayed(&mut self, transition: DelayedTransition) {
        match transition {
            DelayedTransition::StartQuestion(index) => {
                if self.state.phase == Phase::Lobby {
                    self.start_question(index).await;
                }
            },
            DelayedTransition::ShowLeaderboard => {
                if self.state.phase == Phase::Question {
                    self.show_leaderboard().await;
                }
            },
            DelayedTransition::ShowPodiumPhase => {
                if self.state.phase == Phase::Question {
                    self.show_podium().await;
                }
            },
            DelayedTransition::PodiumReveal(position) => {
                self.handle_podium_reveal(position).await;
            },
        }
    }

    async fn handle_podium_reveal(&mut self, position: PodiumPosition) {
        if self.state.phase != Phase::Podium {
            return;
        }
        let rank = match position {
            PodiumPosition::Third => 3,
            PodiumPosition::Second => 2,
            PodiumPosition::First => 1,
        };
        let board = self.leaderboard();
        let player = board.iter().find(|e| e.rank == rank).cloned();
        self.sessions
            .broadcast(&encode_server_message(&ServerMessage::PodiumReveal { position, player }));

        if position == PodiumPosition::First {
            self.state.phase = Phase::Finished;
            self.persist().await;
            self.sessions
                .broadcast(&encode_server_message(&ServerMessage::GameFinished { final_leaderboard: board }));
        }
    }

    // -- §4.9 close handling --------------------------------------------------

    async fn handle_disconnect(&mut self, session_id: SessionId) {
        let Some(role) = self.sessions.remove(session_id) else { return };
        match role {
            Role::Host => {
                self.state.host_connected = false;
                if self.state.phase == Phase::Question && self.ticker.is_some() && !self.state.timer_paused {
                    self.pause_timer().await;
                    self.sessions.broadcast(&encode_server_message(&ServerMessage::GamePaused {
                        reason: "Host disconnected".to_string(),
                    }));
                } else {
                    self.persist().await;
                }
            },
            Role::Player(Some(player_id)) => {
                if let Some(p) = self.state.players.get_mut(&player_id) {
                    p.connected = false;
                }
                self.persist().await;
                let player_count = self.state.connected_player_count();
                self.sessions
                    .broadcast(&encode_server_message(&ServerMessage::PlayerLeft { player_id, player_count }));
            },
            Role::Player(None) => {},
        }

        if self.sessions.is_empty() {
            self.cancel_ticker();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::SnapshotStore;
    use quizhost_core::quiz::Question;
    use std::collections::BTreeSet as BSet;

    fn sample_quiz() -> Quiz {
        Quiz {
            id: "quiz1".into(),
            title: "Sample".into(),
            questions: vec![Question {
                id: "q1".into(),
                text: "2+2?".into(),
                image_url: None,
                answers: ["3".into(), "4".into(), "5".into(), "6".into()],
                correct_indices: BSet::from([1]),
                timer_seconds: 5,
                double_points: false,
            }],
        }
    }

    fn temp_store() -> SnapshotStore {
        SnapshotStore::new(std::env::temp_dir().join(format!("quizhost-coord-test-{}", now_ms())))
    }

    #[tokio::test]
    async fn lobby_join_flow_produces_expected_messages() {
        let handle = Coordinator::spawn("game-1".into(), temp_store(), 200).await;

        let (host_tx, mut host_rx) = mpsc::unbounded_channel();
        let host_session = handle.connect(true, host_tx).await.unwrap();
        // game_state catch-up
        assert!(host_rx.recv().await.unwrap().contains("\"type\":\"game_state\""));

        let (player_tx, mut player_rx) = mpsc::unbounded_channel();
        let player_session = handle.connect(false, player_tx).await.unwrap();
        assert!(player_rx.recv().await.unwrap().contains("\"type\":\"game_state\""));

        handle.client_message(
            player_session,
            serde_json::json!({"type":"player_join","nickname":"Alice"}).to_string(),
        );

        let joined_broadcast = host_rx.recv().await.unwrap();
        assert!(joined_broadcast.contains("\"type\":\"player_joined\""));
        assert!(joined_broadcast.contains("Alice"));

        let _player_own_game_state = player_rx.recv().await.unwrap();

        let snapshot = handle.inspect().await.unwrap();
        assert_eq!(snapshot.phase, Phase::Lobby);
        let _ = host_session;
    }

    #[tokio::test]
    async fn quiz_validation_error_does_not_mutate_state() {
        let handle = Coordinator::spawn("game-2".into(), temp_store(), 200).await;
        let (host_tx, mut host_rx) = mpsc::unbounded_channel();
        handle.connect(true, host_tx).await.unwrap();
        let _ = host_rx.recv().await; // game_state

        handle.client_message(
            0,
            serde_json::json!({"type":"host_create_quiz","quiz":{"id":"q","title":"","questions":[]}}).to_string(),
        );
        let reply = host_rx.recv().await.unwrap();
        assert!(reply.contains("\"type\":\"error\""));
    }

    #[tokio::test]
    async fn full_round_scores_and_reaches_leaderboard() {
        let handle = Coordinator::spawn("game-3".into(), temp_store(), 200).await;

        let (host_tx, mut host_rx) = mpsc::unbounded_channel();
        let _host_session = handle.connect(true, host_tx).await.unwrap();
        let _ = host_rx.recv().await;

        let (player_tx, mut player_rx) = mpsc::unbounded_channel();
        let player_session = handle.connect(false, player_tx).await.unwrap();
        let _ = player_rx.recv().await;

        handle.client_message(
            player_session,
            serde_json::json!({"type":"player_join","nickname":"Bob"}).to_string(),
        );
        let _joined = host_rx.recv().await.unwrap();
        let _own_state = player_rx.recv().await.unwrap();

        handle.client_message(
            0,
            serde_json::json!({
                "type":"host_create_quiz",
                "quiz": sample_quiz(),
            })
            .to_string(),
        );
        let _quiz_broadcast_host = host_rx.recv().await.unwrap();
        let _quiz_broadcast_player = player_rx.recv().await.unwrap();

        handle.client_message(0, serde_json::json!({"type":"host_start_game"}).to_string());
        let _starting_host = host_rx.recv().await.unwrap();
        let _starting_player = player_rx.recv().await.unwrap();

        // question_start arrives after the 3s delay; wait for it.
        let question_start = tokio::time::timeout(Duration::from_secs(5), player_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(question_start.contains("\"type\":\"question_start\""));
        let _question_start_host = host_rx.recv().await.unwrap();

        handle.client_message(
            player_session,
            serde_json::json!({"type":"player_answer","questionId":"q1","answerIndices":[1]}).to_string(),
        );
        // answer_received broadcast to both, then immediate early-termination end.
        let _answer_received_host = host_rx.recv().await.unwrap();
        let _answer_received_player = player_rx.recv().await.unwrap();

        let question_end = tokio::time::timeout(Duration::from_secs(2), host_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(question_end.contains("\"type\":\"question_end\""));

        let snapshot = handle.inspect().await.unwrap();
        assert_eq!(snapshot.phase, Phase::Question); // leaderboard transition is delayed 3s
    }

    /// Build a bare `Coordinator` sitting mid-question, for white-box tests
    /// of the timer-recovery paths below that don't go through `spawn`'s
    /// mailbox (those paths only matter before any ticker exists, so driving
    /// them through real delays would mean multi-second sleeps for no
    /// benefit).
    fn mid_question_coordinator(store: SnapshotStore) -> Coordinator {
        let mut state = GameState::fresh(GamePin(123456));
        state.quiz = Some(sample_quiz());
        state.phase = Phase::Question;
        state.current_question_index = 0;
        let (tx, _rx) = mpsc::unbounded_channel();
        Coordinator {
            game_id: "game-mid-question".into(),
            state,
            store,
            sessions: SessionRegistry::new(),
            self_tx: tx,
            max_players: 200,
            ticker: None,
            next_generation: 0,
            current_seconds_left: 0,
            question_ended: false,
        }
    }

    #[tokio::test]
    async fn restart_after_eviction_ends_question_when_already_expired() {
        let mut coordinator = mid_question_coordinator(temp_store());
        // The question's 5s timer ran out long before this reconnect arrives
        // and no ticker survived (none is ever spawned on load).
        coordinator.state.question_start_time = Some(now_ms().saturating_sub(10_000));
        let (tx, mut session_rx) = mpsc::unbounded_channel();
        coordinator.sessions.register(Role::Host, tx);

        coordinator.restart_timer_after_eviction().await;

        assert!(coordinator.question_ended, "question must be marked ended even with no ticker running");
        let broadcast = session_rx.try_recv().expect("question_end must still broadcast");
        assert!(broadcast.contains("\"type\":\"question_end\""));
    }

    #[tokio::test]
    async fn resume_timer_ends_question_when_no_time_remained_at_pause() {
        let mut coordinator = mid_question_coordinator(temp_store());
        coordinator.state.question_start_time = Some(now_ms());
        coordinator.state.timer_paused = true;
        coordinator.state.paused_at_seconds_left = Some(0);
        let (tx, mut session_rx) = mpsc::unbounded_channel();
        coordinator.sessions.register(Role::Host, tx);

        coordinator.resume_timer().await;

        assert!(!coordinator.state.timer_paused);
        assert!(coordinator.question_ended, "question must be marked ended even with no ticker running");
        let broadcast = session_rx.try_recv().expect("question_end must still broadcast");
        assert!(broadcast.contains("\"type\":\"question_end\""));
    }

    #[tokio::test]
    async fn try_end_question_broadcasts_only_once_across_repeated_calls() {
        let mut coordinator = mid_question_coordinator(temp_store());
        coordinator.state.question_start_time = Some(now_ms());
        let (tx, mut session_rx) = mpsc::unbounded_channel();
        coordinator.sessions.register(Role::Host, tx);

        coordinator.try_end_question().await;
        coordinator.try_end_question().await;
        coordinator.try_end_question().await;

        let mut question_end_count = 0;
        while let Ok(msg) = session_rx.try_recv() {
            if msg.contains("\"type\":\"question_end\"") {
                question_end_count += 1;
            }
        }
        assert_eq!(question_end_count, 1);
    }
}
