use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    game_state::GameState,
    ids::PlayerId,
    player::Player,
    quiz::{Question, Quiz},
    scoring::LeaderboardEntry,
};

/// One inbound message from a client socket, tagged by `type` (§6.1).
/// Role/phase preconditions are enforced by the dispatcher, not here —
/// this type only describes shape, not legality.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    HostCreateQuiz {
        quiz: Quiz,
    },
    HostStartGame,
    HostNextQuestion,
    HostShowLeaderboard,
    HostShowPodium,
    #[serde(rename_all = "camelCase")]
    PlayerJoin {
        nickname: String,
    },
    #[serde(rename_all = "camelCase")]
    PlayerRejoin {
        player_id: PlayerId,
        nickname: String,
    },
    #[serde(rename_all = "camelCase")]
    PlayerAnswer {
        question_id: String,
        answer_indices: BTreeSet<u8>,
    },
}

/// A reveal position in the podium sequence: 3rd place first, then 2nd,
/// then 1st (§4.4 `showPodium`). Serializes as its bare integer value since
/// clients key off `position: 1|2|3`, not a string tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodiumPosition {
    First = 1,
    Second = 2,
    Third = 3,
}

impl From<PodiumPosition> for u8 {
    fn from(p: PodiumPosition) -> u8 {
        p as u8
    }
}

impl Serialize for PodiumPosition {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(*self as u8)
    }
}

/// The view of a `Question` sent to clients: never includes
/// `correctIndices`, includes `imageUrl` only for the host (§6.2).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub answers: [String; 4],
    pub timer_seconds: u32,
    pub double_points: bool,
    pub multiple_choice: bool,
}

impl QuestionView {
    pub fn for_role(question: &Question, is_host: bool) -> Self {
        Self {
            id: question.id.clone(),
            text: question.text.clone(),
            image_url: if is_host { question.image_url.clone() } else { None },
            answers: question.answers.clone(),
            timer_seconds: question.timer_seconds,
            double_points: question.double_points,
            multiple_choice: question.is_multiple_choice(),
        }
    }
}

/// One outbound message to a client socket, tagged by `type` (§6.2).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Error {
        message: String,
    },
    GameState {
        state: GameState,
    },
    #[serde(rename_all = "camelCase")]
    PlayerJoined {
        player: Player,
        player_count: usize,
    },
    #[serde(rename_all = "camelCase")]
    PlayerRejoined {
        player: Player,
        player_count: usize,
    },
    #[serde(rename_all = "camelCase")]
    PlayerLeft {
        player_id: PlayerId,
        player_count: usize,
    },
    GameStarting,
    #[serde(rename_all = "camelCase")]
    QuestionStart {
        question: QuestionView,
        question_index: usize,
        total_questions: usize,
    },
    #[serde(rename_all = "camelCase")]
    TimerTick {
        seconds_left: u32,
    },
    #[serde(rename_all = "camelCase")]
    AnswerReceived {
        player_id: PlayerId,
    },
    #[serde(rename_all = "camelCase")]
    QuestionEnd {
        correct_indices: BTreeSet<u8>,
        scores: Vec<LeaderboardEntry>,
    },
    #[serde(rename_all = "camelCase")]
    LeaderboardUpdate {
        leaderboard: Vec<LeaderboardEntry>,
    },
    #[serde(rename_all = "camelCase")]
    PodiumReveal {
        position: PodiumPosition,
        player: Option<LeaderboardEntry>,
    },
    #[serde(rename_all = "camelCase")]
    GameFinished {
        final_leaderboard: Vec<LeaderboardEntry>,
    },
    GamePaused {
        reason: String,
    },
    GameResumed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet as BSet;

    #[test]
    fn decodes_player_join() {
        let raw = r#"{"type":"player_join","nickname":"Alice"}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ClientMessage::PlayerJoin { nickname } => assert_eq!(nickname, "Alice"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn decodes_player_answer_with_camel_case_fields() {
        let raw = r#"{"type":"player_answer","questionId":"q1","answerIndices":[0,2]}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ClientMessage::PlayerAnswer { question_id, answer_indices } => {
                assert_eq!(question_id, "q1");
                assert_eq!(answer_indices, BSet::from([0, 2]));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn decodes_host_start_game_with_no_payload() {
        let raw = r#"{"type":"host_start_game"}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(msg, ClientMessage::HostStartGame));
    }

    #[test]
    fn unknown_type_fails_to_decode() {
        let raw = r#"{"type":"bogus"}"#;
        assert!(serde_json::from_str::<ClientMessage>(raw).is_err());
    }

    #[test]
    fn question_view_omits_image_url_for_players() {
        let q = Question {
            id: "q1".into(),
            text: "?".into(),
            image_url: Some("http://example.com/img.png".into()),
            answers: ["a".into(), "b".into(), "c".into(), "d".into()],
            correct_indices: BSet::from([0]),
            timer_seconds: 10,
            double_points: false,
        };
        let player_view = QuestionView::for_role(&q, false);
        assert!(player_view.image_url.is_none());
        let host_view = QuestionView::for_role(&q, true);
        assert_eq!(host_view.image_url.as_deref(), Some("http://example.com/img.png"));

        let serialized = serde_json::to_value(&player_view).unwrap();
        assert!(serialized.get("imageUrl").is_none());
        assert!(serialized.get("correctIndices").is_none());
    }

    #[test]
    fn question_view_flags_multiple_choice() {
        let q = Question {
            id: "q1".into(),
            text: "?".into(),
            image_url: None,
            answers: ["a".into(), "b".into(), "c".into(), "d".into()],
            correct_indices: BSet::from([0, 1]),
            timer_seconds: 10,
            double_points: false,
        };
        assert!(QuestionView::for_role(&q, false).multiple_choice);
    }

    #[test]
    fn server_message_tag_is_snake_case() {
        let msg = ServerMessage::GameResumed;
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["type"], "game_resumed");
    }

    #[test]
    fn podium_reveal_serializes_nullable_player() {
        let msg = ServerMessage::PodiumReveal {
            position: PodiumPosition::Third,
            player: None,
        };
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["player"], serde_json::Value::Null);
    }
}
