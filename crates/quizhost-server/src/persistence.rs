use std::path::PathBuf;

use quizhost_core::GameState;

#[derive(Debug)]
pub struct PersistenceError(pub String);

impl std::fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "persistence error: {}", self.0)
    }
}

impl std::error::Error for PersistenceError {}

/// Durable storage for game snapshots, one JSON file per game id under a
/// base directory (§6.4). Reads happen only at coordinator construction;
/// writes happen after every state-affecting operation and are awaited to
/// completion before the handler that triggered them replies, so observers
/// never see state the snapshot doesn't yet reflect (§4.1, §5).
///
/// Writes go to a temp file first and are then renamed into place, so a
/// crash mid-write cannot leave a corrupt snapshot behind.
#[derive(Clone)]
pub struct SnapshotStore {
    base_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    fn path_for(&self, game_id: &str) -> PathBuf {
        self.base_dir.join(format!("{game_id}.json"))
    }

    pub async fn load(&self, game_id: &str) -> Result<Option<GameState>, PersistenceError> {
        let path = self.path_for(game_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let state = serde_json::from_slice(&bytes)
                    .map_err(|e| PersistenceError(format!("corrupt snapshot for {game_id}: {e}")))?;
                Ok(Some(state))
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError(format!("failed to read snapshot for {game_id}: {e}"))),
        }
    }

    pub async fn save(&self, game_id: &str, state: &GameState) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|e| PersistenceError(format!("failed to create snapshot dir: {e}")))?;

        let bytes = serde_json::to_vec(state)
            .map_err(|e| PersistenceError(format!("failed to serialize snapshot: {e}")))?;

        let final_path = self.path_for(game_id);
        let tmp_path = self
            .base_dir
            .join(format!("{game_id}.json.tmp-{}", quizhost_core::time::now_ms()));
        tokio::fs::write(&tmp_path, &bytes)
            .await
            .map_err(|e| PersistenceError(format!("failed to write snapshot for {game_id}: {e}")))?;
        tokio::fs::rename(&tmp_path, &final_path)
            .await
            .map_err(|e| PersistenceError(format!("failed to finalize snapshot for {game_id}: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizhost_core::GamePin;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("quizhost-test-{}", quizhost_core::time::now_ms()))
    }

    #[tokio::test]
    async fn missing_snapshot_loads_as_none() {
        let store = SnapshotStore::new(temp_dir());
        assert!(store.load("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn round_trips_a_saved_snapshot() {
        let dir = temp_dir();
        let store = SnapshotStore::new(&dir);
        let state = GameState::fresh(GamePin(123456));

        store.save("game-1", &state).await.unwrap();
        let loaded = store.load("game-1").await.unwrap().unwrap();
        assert_eq!(loaded, state);

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn overwrite_replaces_prior_snapshot() {
        let dir = temp_dir();
        let store = SnapshotStore::new(&dir);
        let mut state = GameState::fresh(GamePin(222222));
        store.save("game-2", &state).await.unwrap();

        state.phase = quizhost_core::Phase::Lobby;
        state.current_question_index = -1;
        store.save("game-2", &state).await.unwrap();

        let loaded = store.load("game-2").await.unwrap().unwrap();
        assert_eq!(loaded.game_pin, GamePin(222222));

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
