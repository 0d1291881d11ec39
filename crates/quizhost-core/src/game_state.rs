use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    ids::{GamePin, PlayerId},
    phase::Phase,
    player::Player,
    quiz::Quiz,
};

/// The complete durable state of one game. A Coordinator owns exactly one
/// of these and persists it after every state-affecting operation (§4.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub phase: Phase,
    pub game_pin: GamePin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz: Option<Quiz>,
    /// Insertion-ordered so the leaderboard's score-tie tie-break (§9) can
    /// rely on iteration order without a separate sequence counter.
    #[serde(default)]
    pub players: IndexMap<PlayerId, Player>,
    /// -1 while in the lobby; the index of the active/most-recent question
    /// otherwise.
    pub current_question_index: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_start_time: Option<u64>,
    #[serde(default)]
    pub host_connected: bool,
    #[serde(default)]
    pub timer_paused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_at_seconds_left: Option<u32>,
}

impl GameState {
    /// A brand-new game sitting in the lobby with a freshly minted PIN.
    pub fn fresh(game_pin: GamePin) -> Self {
        Self {
            phase: Phase::Lobby,
            game_pin,
            quiz: None,
            players: IndexMap::new(),
            current_question_index: -1,
            question_start_time: None,
            host_connected: false,
            timer_paused: false,
            paused_at_seconds_left: None,
        }
    }

    /// Reset connection-derived fields that cannot survive a process
    /// restart: no socket does (§4.1).
    pub fn mark_all_disconnected(&mut self) {
        self.host_connected = false;
        for player in self.players.values_mut() {
            player.connected = false;
        }
    }

    pub fn current_question(&self) -> Option<&crate::quiz::Question> {
        let quiz = self.quiz.as_ref()?;
        if self.current_question_index < 0 {
            return None;
        }
        quiz.questions.get(self.current_question_index as usize)
    }

    pub fn connected_player_count(&self) -> usize {
        self.players.values().filter(|p| p.connected).count()
    }

    /// Every currently-connected player has an answer recorded for the
    /// given question, and at least one connected player exists (§4.5).
    pub fn all_connected_answered(&self, question_id: &str) -> bool {
        let connected: Vec<_> = self.players.values().filter(|p| p.connected).collect();
        !connected.is_empty() && connected.iter().all(|p| p.has_answered(question_id))
    }
}
