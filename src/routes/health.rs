// /api/health/* handlers

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};

use super::AppState;
use super::response::ApiResponse;
use crate::error::MonitorError;
use crate::models::{
    CycleReport, InterfaceConfig, InterfaceConfigPatch, PeerHealthRecord, StatusSnapshot,
};

/// GET /api/health/status: last committed snapshot; safe to poll while a cycle runs.
pub(super) async fn status_handler(
    State(state): State<AppState>,
) -> Json<ApiResponse<StatusSnapshot>> {
    ApiResponse::ok(state.monitor.status())
}

pub(super) async fn start_handler(State(state): State<AppState>) -> impl IntoResponse {
    if state.monitor.start() {
        ApiResponse::message(true, "Peer health monitor started")
    } else {
        ApiResponse::message(true, "Peer health monitor is already running")
    }
}

pub(super) async fn stop_handler(State(state): State<AppState>) -> impl IntoResponse {
    if state.monitor.stop() {
        ApiResponse::message(true, "Peer health monitor stopped")
    } else {
        ApiResponse::message(true, "Peer health monitor is not running")
    }
}

/// POST /api/health/cycle: 409 while another cycle is in progress.
pub(super) async fn cycle_handler(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<CycleReport>>, MonitorError> {
    let report = state.monitor.force_cycle().await?;
    Ok(ApiResponse::ok(report))
}

/// POST /api/health/peer/{key}/ping: the key arrives percent-decoded from the path extractor.
pub(super) async fn ping_peer_handler(
    State(state): State<AppState>,
    Path(public_key): Path<String>,
) -> Result<Json<ApiResponse<PeerHealthRecord>>, MonitorError> {
    let record = state.monitor.ping_peer(&public_key).await?;
    Ok(ApiResponse::ok(record))
}

pub(super) async fn peer_handler(
    State(state): State<AppState>,
    Path(public_key): Path<String>,
) -> Result<Json<ApiResponse<PeerHealthRecord>>, MonitorError> {
    Ok(ApiResponse::ok(state.monitor.peer(&public_key)?))
}

pub(super) async fn get_config_handler(
    State(state): State<AppState>,
    Path(interface): Path<String>,
) -> Result<Json<ApiResponse<InterfaceConfig>>, MonitorError> {
    Ok(ApiResponse::ok(state.monitor.interface_config(&interface)?))
}

/// POST /api/health/config/{iface}: body is a partial config.
pub(super) async fn update_config_handler(
    State(state): State<AppState>,
    Path(interface): Path<String>,
    body: Result<Json<InterfaceConfigPatch>, JsonRejection>,
) -> Response {
    let Json(patch) = match body {
        Ok(b) => b,
        Err(rejection) => {
            return (
                rejection.status(),
                ApiResponse::message(false, rejection.body_text()),
            )
                .into_response();
        }
    };
    match state
        .monitor
        .update_interface_config(&interface, &patch)
        .await
    {
        Ok(cfg) => ApiResponse::ok(cfg).into_response(),
        Err(e) => e.into_response(),
    }
}
