// HTTP routes

mod health;
mod http;
pub mod response;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::monitor::HealthMonitor;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) monitor: Arc<HealthMonitor>,
}

pub fn app(monitor: Arc<HealthMonitor>) -> Router {
    let state = AppState { monitor };
    Router::new()
        .route("/", get(http::root_handler)) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/health/status", get(health::status_handler))
        .route("/api/health/start", post(health::start_handler))
        .route("/api/health/stop", post(health::stop_handler))
        .route("/api/health/cycle", post(health::cycle_handler))
        .route("/api/health/peer/{key}", get(health::peer_handler))
        .route("/api/health/peer/{key}/ping", post(health::ping_peer_handler))
        .route(
            "/api/health/config/{iface}",
            get(health::get_config_handler).post(health::update_config_handler),
        )
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
