//! Shared types, pure scoring logic, and wire protocol for the quiz host
//! coordinator. Nothing in this crate touches a socket, a clock source
//! other than `time::now_ms`, or a filesystem; the runtime concerns live in
//! `quizhost-server`.

pub mod game_state;
pub mod ids;
pub mod net;
pub mod phase;
pub mod player;
pub mod quiz;
pub mod scoring;
pub mod time;

pub use game_state::GameState;
pub use ids::{GamePin, PlayerId};
pub use phase::Phase;
pub use player::{Answer, Player};
pub use quiz::{Question, Quiz, QuizValidationError};
