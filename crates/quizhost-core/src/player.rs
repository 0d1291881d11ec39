use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::ids::PlayerId;

/// One player's recorded response to a single question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub answer_indices: BTreeSet<u8>,
    pub timestamp: u64,
}

/// A player within a single game. Never removed once created; `connected`
/// tracks live-socket presence independent of participation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub nickname: String,
    #[serde(default)]
    pub score: u64,
    #[serde(default)]
    pub answers: HashMap<String, Answer>,
    #[serde(default)]
    pub connected: bool,
}

impl Player {
    pub fn new(id: PlayerId, nickname: String) -> Self {
        Self {
            id,
            nickname,
            score: 0,
            answers: HashMap::new(),
            connected: true,
        }
    }

    pub fn has_answered(&self, question_id: &str) -> bool {
        self.answers.contains_key(question_id)
    }
}

/// Minimum/maximum accepted nickname length after trimming (§4.6).
pub const MIN_NICKNAME_LEN: usize = 1;
pub const MAX_NICKNAME_LEN: usize = 50;

/// Maximum concurrent players in a single session (§4.6 boundary behavior).
pub const MAX_PLAYERS: usize = 200;

/// Normalize a raw nickname: trim whitespace. Length and uniqueness checks
/// are the caller's responsibility since they require access to the roster.
pub fn normalize_nickname(raw: &str) -> String {
    raw.trim().to_string()
}

pub fn nickname_len_valid(nickname: &str) -> bool {
    let len = nickname.chars().count();
    (MIN_NICKNAME_LEN..=MAX_NICKNAME_LEN).contains(&len)
}

/// Case-insensitive nickname equality, per §3's uniqueness invariant.
pub fn nicknames_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
