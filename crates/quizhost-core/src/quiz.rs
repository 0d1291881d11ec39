use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Timer durations a question may be authored with. Any other value is
/// rejected at quiz intake (§4.3 / §8 boundary behaviors).
pub const ALLOWED_TIMER_SECONDS: [u32; 5] = [5, 10, 20, 30, 60];

/// A single multiple-choice question. Always exactly 4 answer texts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub answers: [String; 4],
    /// Indices into `answers` that are correct. Non-empty subset of 0..4.
    pub correct_indices: BTreeSet<u8>,
    pub timer_seconds: u32,
    #[serde(default)]
    pub double_points: bool,
}

impl Question {
    pub fn max_points(&self) -> u32 {
        if self.double_points { 2000 } else { 1000 }
    }

    /// Whether the question is configured to accept more than one correct
    /// answer. Surfaced to clients as `multipleChoice` so they can render a
    /// multi-select affordance.
    pub fn is_multiple_choice(&self) -> bool {
        self.correct_indices.len() > 1
    }
}

/// A quiz authored by the host: an ordered list of questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    pub title: String,
    pub questions: Vec<Question>,
}

/// Why a quiz (or one of its questions) failed structural validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizValidationError(pub String);

impl std::fmt::Display for QuizValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for QuizValidationError {}

/// Validate a quiz's structure per §4.3. This is deliberately strict: the
/// source material treats validation inconsistently across versions, but
/// this implementation always rejects a malformed quiz rather than
/// silently accepting it.
pub fn validate_quiz(quiz: &Quiz) -> Result<(), QuizValidationError> {
    if quiz.title.trim().is_empty() {
        return Err(QuizValidationError("quiz title must not be empty".into()));
    }
    if quiz.questions.is_empty() {
        return Err(QuizValidationError(
            "quiz must contain at least one question".into(),
        ));
    }
    for (i, q) in quiz.questions.iter().enumerate() {
        if q.id.trim().is_empty() {
            return Err(QuizValidationError(format!(
                "question {i}: id must not be empty"
            )));
        }
        if q.text.trim().is_empty() {
            return Err(QuizValidationError(format!(
                "question {i} ({}): text must not be empty",
                q.id
            )));
        }
        if q.correct_indices.is_empty() {
            return Err(QuizValidationError(format!(
                "question {i} ({}): correctIndices must not be empty",
                q.id
            )));
        }
        if q.correct_indices.iter().any(|&idx| idx > 3) {
            return Err(QuizValidationError(format!(
                "question {i} ({}): correctIndices must be within 0..=3",
                q.id
            )));
        }
        if !ALLOWED_TIMER_SECONDS.contains(&q.timer_seconds) {
            return Err(QuizValidationError(format!(
                "question {i} ({}): timerSeconds must be one of {:?}, got {}",
                q.id, ALLOWED_TIMER_SECONDS, q.timer_seconds
            )));
        }
    }
    Ok(())
}
