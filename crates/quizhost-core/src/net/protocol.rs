//! Wire-level constants and encode/decode helpers. Kept separate from
//! `messages.rs` so the message shapes stay free of transport concerns.

use super::messages::{ClientMessage, ServerMessage};

/// Query parameter read at WebSocket upgrade time to decide session role
/// (§6.3 `GET /ws?host={true|false}`).
pub const HOST_QUERY_PARAM: &str = "host";

/// Decode one inbound text frame. Parse failures (malformed JSON or an
/// unrecognized `type`) are reported back to the caller as a `String` so
/// the dispatcher can reply with `ServerMessage::Error` without mutating
/// state, per §4.2 and §7.
pub fn decode_client_message(raw: &str) -> Result<ClientMessage, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid message: {e}"))
}

/// Encode one outbound message as a text frame.
pub fn encode_server_message(message: &ServerMessage) -> String {
    serde_json::to_string(message).expect("ServerMessage always serializes")
}
