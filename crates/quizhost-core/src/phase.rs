use serde::{Deserialize, Serialize};

/// A game's position in its lifecycle. Transitions are strictly forward
/// along `lobby -> question -> (leaderboard -> question)* -> podium ->
/// finished`; there are no backward edges (§8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Lobby,
    Question,
    Leaderboard,
    Podium,
    Finished,
}

impl Phase {
    /// Whether `self -> next` is a legal transition per the state graph.
    pub fn can_transition_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Lobby, Phase::Question)
                | (Phase::Question, Phase::Leaderboard)
                | (Phase::Question, Phase::Podium)
                | (Phase::Leaderboard, Phase::Question)
                | (Phase::Leaderboard, Phase::Podium)
                | (Phase::Podium, Phase::Finished)
        )
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Lobby => "lobby",
            Phase::Question => "question",
            Phase::Leaderboard => "leaderboard",
            Phase::Podium => "podium",
            Phase::Finished => "finished",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lobby_only_advances_to_question() {
        assert!(Phase::Lobby.can_transition_to(Phase::Question));
        assert!(!Phase::Lobby.can_transition_to(Phase::Leaderboard));
        assert!(!Phase::Lobby.can_transition_to(Phase::Podium));
        assert!(!Phase::Lobby.can_transition_to(Phase::Finished));
        assert!(!Phase::Lobby.can_transition_to(Phase::Lobby));
    }

    #[test]
    fn question_can_end_to_leaderboard_or_podium() {
        assert!(Phase::Question.can_transition_to(Phase::Leaderboard));
        assert!(Phase::Question.can_transition_to(Phase::Podium));
        assert!(!Phase::Question.can_transition_to(Phase::Lobby));
        assert!(!Phase::Question.can_transition_to(Phase::Finished));
    }

    #[test]
    fn leaderboard_loops_back_or_moves_to_podium() {
        assert!(Phase::Leaderboard.can_transition_to(Phase::Question));
        assert!(Phase::Leaderboard.can_transition_to(Phase::Podium));
        assert!(!Phase::Leaderboard.can_transition_to(Phase::Finished));
    }

    #[test]
    fn podium_only_advances_to_finished() {
        assert!(Phase::Podium.can_transition_to(Phase::Finished));
        assert!(!Phase::Podium.can_transition_to(Phase::Lobby));
        assert!(!Phase::Podium.can_transition_to(Phase::Question));
    }

    #[test]
    fn finished_is_terminal() {
        for p in [
            Phase::Lobby,
            Phase::Question,
            Phase::Leaderboard,
            Phase::Podium,
            Phase::Finished,
        ] {
            assert!(!Phase::Finished.can_transition_to(p));
        }
    }

    #[test]
    fn no_backward_edges_exist() {
        let order = [
            Phase::Lobby,
            Phase::Question,
            Phase::Leaderboard,
            Phase::Podium,
            Phase::Finished,
        ];
        // The only backward-looking edge in the whole graph is leaderboard -> question,
        // which is the explicit replay loop, not a "backward edge" in the §8 sense.
        for (i, &from) in order.iter().enumerate() {
            for (j, &to) in order.iter().enumerate() {
                if j < i && !(from == Phase::Leaderboard && to == Phase::Question) {
                    assert!(!from.can_transition_to(to), "{from} -> {to} must be illegal");
                }
            }
        }
    }

    #[test]
    fn serializes_as_snake_case() {
        assert_eq!(serde_json::to_string(&Phase::Leaderboard).unwrap(), "\"leaderboard\"");
    }
}
