pub mod messages;
pub mod protocol;

pub use messages::{ClientMessage, PodiumPosition, QuestionView, ServerMessage};
pub use protocol::{decode_client_message, encode_server_message};
