pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod health;
pub mod persistence;
pub mod pin_registry;
pub mod rate_limit;
pub mod session_registry;
pub mod state;
pub mod ws;

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::extract::ConnectInfo;
use axum::middleware;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let state = AppState::new(config);

    let api_routes = Router::new()
        .route("/games", axum::routing::post(api::create_game))
        .route("/games/{game_id}/pin", axum::routing::get(api::get_pin))
        .route("/games/{game_id}/state", axum::routing::get(api::get_state))
        .layer(middleware::from_fn_with_state(state.clone(), api_rate_limit_layer))
        .layer(ServiceBuilder::new().layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(10),
        )));

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = Router::new()
        .route("/ws/{game_id}", axum::routing::get(ws::ws_handler))
        .route("/health", axum::routing::get(health::health_check))
        .route("/health/ready", axum::routing::get(health::readiness_check))
        .nest("/api/v1", api_routes)
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_FRAME_OPTIONS,
            axum::http::HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            axum::http::HeaderValue::from_static("nosniff"),
        ))
        .with_state(state.clone());

    (app, state)
}

/// Middleware that enforces per-IP rate limiting on the HTTP API endpoints
/// (the WebSocket endpoint has its own per-IP connection cap, see `ws.rs`).
async fn api_rate_limit_layer(
    axum::extract::State(state): axum::extract::State<AppState>,
    request: axum::extract::Request,
    next: middleware::Next,
) -> Result<axum::response::Response, axum::http::StatusCode> {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST));
    if !state.api_rate_limiter.check_rate_limit(ip).await {
        tracing::warn!(%ip, "API rate limit exceeded");
        return Err(axum::http::StatusCode::TOO_MANY_REQUESTS);
    }
    Ok(next.run(request).await)
}

/// Background task that periodically clears stale rate-limiter buckets.
pub fn spawn_rate_limit_cleanup(state: AppState) {
    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Rate limiter cleanup shutting down");
                    break;
                }
                _ = interval.tick() => {
                    state.api_rate_limiter.cleanup(Duration::from_secs(300)).await;
                }
            }
        }
    });
}
