//! Pure scoring and leaderboard computation (§4.5). Nothing in this module
//! touches a clock, a socket, or persistence; it is a function of the data
//! handed to it, which keeps it trivially testable and replay-safe.

use serde::{Deserialize, Serialize};

use crate::{ids::PlayerId, player::Player, quiz::Question};

/// Whether a player's submitted answer exactly matches the question's
/// correct-answer set. Implemented as a size check plus containment rather
/// than building two full sets, per the set-equality note in the design.
pub fn is_correct(question: &Question, submitted: &std::collections::BTreeSet<u8>) -> bool {
    submitted.len() == question.correct_indices.len()
        && submitted.iter().all(|idx| question.correct_indices.contains(idx))
}

/// Points awarded for a correct answer at the given response time, per the
/// §4.5 formula: `round(maxPoints * (0.5 + 0.5 * timeBonus))` where
/// `timeBonus = max(0, 1 - responseTime / timeWindow)`.
pub fn points_for_response(max_points: u32, time_window_ms: u64, response_time_ms: i64) -> u32 {
    let time_bonus = if time_window_ms == 0 {
        0.0
    } else {
        (1.0 - (response_time_ms as f64 / time_window_ms as f64)).max(0.0)
    };
    let points = (max_points as f64) * (0.5 + 0.5 * time_bonus);
    points.round() as u32
}

/// Score one player's answer (if any) against a question, returning the
/// points to add to their running total. Returns 0 for absent or incorrect
/// answers; never called twice for the same (player, question) pair by the
/// coordinator, which is what keeps scoring a one-shot event.
pub fn score_answer(
    question: &Question,
    question_start_time: u64,
    player: &Player,
) -> u32 {
    let Some(answer) = player.answers.get(&question.id) else {
        return 0;
    };
    if !is_correct(question, &answer.answer_indices) {
        return 0;
    }
    let response_time_ms = answer.timestamp as i64 - question_start_time as i64;
    let time_window_ms = question.timer_seconds as u64 * 1000;
    points_for_response(question.max_points(), time_window_ms, response_time_ms)
}

/// One row of a rendered leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub player_id: PlayerId,
    pub nickname: String,
    pub score: u64,
    pub rank: u32,
    pub last_answer_correct: bool,
}

/// Build the full leaderboard: all players sorted by descending score with
/// ties broken by insertion order (a stable sort keyed only on score), then
/// ranked 1..N. `current_question` is used only to populate
/// `lastAnswerCorrect`; pass `None` before any question has been asked.
pub fn build_leaderboard(
    players_in_insertion_order: &[&Player],
    current_question: Option<&Question>,
) -> Vec<LeaderboardEntry> {
    let mut ordered: Vec<&Player> = players_in_insertion_order.to_vec();
    ordered.sort_by(|a, b| b.score.cmp(&a.score));

    ordered
        .into_iter()
        .enumerate()
        .map(|(i, player)| {
            let last_answer_correct = current_question
                .map(|q| {
                    player
                        .answers
                        .get(&q.id)
                        .is_some_and(|ans| is_correct(q, &ans.answer_indices))
                })
                .unwrap_or(false);
            LeaderboardEntry {
                player_id: player.id.clone(),
                nickname: player.nickname.clone(),
                score: player.score,
                rank: (i + 1) as u32,
                last_answer_correct,
            }
        })
        .collect()
}
