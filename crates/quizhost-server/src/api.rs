use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct CreateGameResponse {
    pub game_id: String,
    pub game_pin: String,
}

/// Create a new game and reserve a collision-free PIN for it. Stands in
/// for whatever the real gateway does when a host starts a session; the
/// coordinator itself never calls this (§6.3).
pub async fn create_game(State(state): State<AppState>) -> Json<CreateGameResponse> {
    let max_players = state.config.limits.max_players_per_game;
    let (game_id, handle) = state
        .coordinators
        .create_game(state.store.clone(), &state.pin_registry, max_players)
        .await;
    let snapshot = handle.inspect().await.expect("freshly created coordinator is alive");
    Json(CreateGameResponse { game_id, game_pin: snapshot.game_pin.to_string() })
}

#[derive(Serialize)]
pub struct PinResponse {
    pub game_pin: String,
}

/// `GET /games/{gameId}/pin` (§6.3).
pub async fn get_pin(State(state): State<AppState>, Path(game_id): Path<String>) -> Result<Json<PinResponse>, AppError> {
    let handle = state
        .coordinators
        .get(&game_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("no such game: {game_id}")))?;
    let snapshot = handle
        .inspect()
        .await
        .ok_or_else(|| AppError::Internal("coordinator is no longer running".to_string()))?;
    Ok(Json(PinResponse { game_pin: snapshot.game_pin.to_string() }))
}

#[derive(Serialize)]
pub struct StateResponse {
    pub game_pin: String,
    pub phase: String,
}

/// `GET /games/{gameId}/state` (§6.3).
pub async fn get_state(State(state): State<AppState>, Path(game_id): Path<String>) -> Result<Json<StateResponse>, AppError> {
    let handle = state
        .coordinators
        .get(&game_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("no such game: {game_id}")))?;
    let snapshot = handle
        .inspect()
        .await
        .ok_or_else(|| AppError::Internal("coordinator is no longer running".to_string()))?;
    Ok(Json(StateResponse {
        game_pin: snapshot.game_pin.to_string(),
        phase: snapshot.phase.to_string(),
    }))
}
