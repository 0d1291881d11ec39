use axum::Json;
use axum::extract::State;
use serde::Serialize;
use std::sync::atomic::Ordering;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Liveness probe: if this handler runs at all, the process is up.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub active_ws_connections: usize,
}

/// Readiness probe: also reports current load so an operator can see at a
/// glance whether the instance is worth routing to.
pub async fn readiness_check(State(state): State<AppState>) -> Json<ReadinessResponse> {
    Json(ReadinessResponse {
        status: "ready",
        active_ws_connections: state.ws_connection_count.load(Ordering::Relaxed),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    #[tokio::test]
    async fn health_check_reports_ok() {
        let Json(res) = health_check().await;
        assert_eq!(res.status, "ok");
    }

    #[tokio::test]
    async fn readiness_check_reports_zero_connections_initially() {
        let mut config = ServerConfig::default();
        config.persistence.snapshot_dir =
            std::env::temp_dir().join(format!("quizhost-health-test-{}", quizhost_core::time::now_ms()))
                .to_string_lossy()
                .into_owned();
        let state = AppState::new(config);
        let Json(res) = readiness_check(State(state)).await;
        assert_eq!(res.status, "ready");
        assert_eq!(res.active_ws_connections, 0);
    }
}
