//! Device registration and fleet status handlers.

use axum::{
    extract::{Extension, Query, State},
    response::Json,
};

use crate::auth::SessionInfo;
use crate::models::{
    ActiveQuery, ApiError, DeviceQuery, DeviceView, LivenessResponse, LogEntryView,
    RegisterDeviceRequest,
};
use crate::server::types::{DEFAULT_ACTIVE_WINDOW_SECS, MAX_LOG_LIMIT};
use crate::server::ServerState;

/// Register a device under the calling operator's account.
pub async fn register_device_handler(
    State(state): State<ServerState>,
    Extension(session): Extension<SessionInfo>,
    Json(req): Json<RegisterDeviceRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let device = state
        .service
        .register_device(&req.device_id, &req.secret, &session.username)
        .await?;
    Ok(Json(serde_json::json!({"device_id": device.device_id})))
}

/// Liveness timestamps and queue depth for one device.
pub async fn last_seen_handler(
    State(state): State<ServerState>,
    Query(query): Query<DeviceQuery>,
) -> Result<Json<LivenessResponse>, ApiError> {
    let live = state.service.device_liveness(&query.device_id)?;
    Ok(Json(LivenessResponse {
        device_id: live.device_id,
        last_seen: live.last_seen,
        last_request_time: live.last_request_time,
        pending_commands: live.pending_commands,
    }))
}

/// Every registered device with its timestamps.
pub async fn list_devices_handler(
    State(state): State<ServerState>,
) -> Result<Json<Vec<DeviceView>>, ApiError> {
    let devices = state.service.list_devices()?;
    Ok(Json(devices.into_iter().map(DeviceView::from).collect()))
}

/// Devices that checked in within the window (default 120s).
pub async fn active_devices_handler(
    State(state): State<ServerState>,
    Query(query): Query<ActiveQuery>,
) -> Result<Json<Vec<DeviceView>>, ApiError> {
    let window = query.window_secs.unwrap_or(DEFAULT_ACTIVE_WINDOW_SECS);
    let devices = state.service.active_devices(window)?;
    Ok(Json(devices.into_iter().map(DeviceView::from).collect()))
}

/// Recent activity-log entries, newest first.
pub async fn recent_logs_handler(
    State(state): State<ServerState>,
) -> Result<Json<Vec<LogEntryView>>, ApiError> {
    let logs = state.service.recent_activity(MAX_LOG_LIMIT)?;
    Ok(Json(logs.into_iter().map(LogEntryView::from).collect()))
}
