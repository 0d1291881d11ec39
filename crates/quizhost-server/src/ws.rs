use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use quizhost_core::net::protocol::HOST_QUERY_PARAM;
use std::collections::HashMap;
use tokio::sync::mpsc;

use crate::state::{AppState, ConnectionGuard, IpConnectionGuard};

/// Admit one WebSocket connection into a game's coordinator (§4.2, §6.3).
/// `host={true|false}` in the query string decides the session's role;
/// the host is never assigned a `playerId`.
pub async fn ws_handler(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    let is_host = params
        .get(HOST_QUERY_PARAM)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let ip = addr.ip();
    let Some(ip_guard) = IpConnectionGuard::try_acquire(ip, state.ws_per_ip.clone(), state.config.limits.max_ws_per_ip)
    else {
        return (StatusCode::TOO_MANY_REQUESTS, "too many connections from this address").into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, game_id, is_host, ip_guard))
}

async fn handle_socket(socket: WebSocket, state: AppState, game_id: String, is_host: bool, ip_guard: IpConnectionGuard) {
    let _conn_guard = ConnectionGuard::new(state.ws_connection_count.clone());
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();

    let max_players = state.config.limits.max_players_per_game;
    let handle = state.coordinators.get_or_spawn(&game_id, state.store.clone(), max_players).await;

    let Some(session_id) = handle.connect(is_host, outbound_tx).await else {
        tracing::warn!(game_id, "coordinator mailbox closed before connect completed");
        return;
    };

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(Message::Text(message.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => handle.client_message(session_id, text.to_string()),
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {},
        }
    }

    handle.disconnect(session_id);
    writer.abort();
    drop(ip_guard);
}
