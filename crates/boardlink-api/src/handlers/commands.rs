//! Command queue handlers: enqueue, poll, list, cancel, batch load.

use axum::{
    extract::{Extension, Query, State},
    response::Json,
};

use boardlink_core::error::Error;
use boardlink_dispatch::PollOutcome;

use crate::auth::SessionInfo;
use crate::models::{
    ApiError, CommandView, DeviceQuery, EnqueueRequest, LoadCommandsRequest, PollQuery,
    PollResponse, RemoveCommandRequest,
};
use crate::server::ServerState;

/// Queue a command for a device.
pub async fn enqueue_handler(
    State(state): State<ServerState>,
    Extension(session): Extension<SessionInfo>,
    Json(req): Json<EnqueueRequest>,
) -> Result<Json<CommandView>, ApiError> {
    // Enqueueing for a device that was never registered is a caller
    // mistake, not a lookup miss: a plain 400 like the other bad inputs.
    let record = state
        .service
        .enqueue_command(&req.device_id, &req.payload)
        .await
        .map_err(|e| match e {
            Error::NotFound(msg) => ApiError(Error::validation(msg)),
            other => ApiError(other),
        })?;
    tracing::debug!(
        operator = %session.username,
        device_id = %req.device_id,
        command_id = record.id,
        "Command queued"
    );
    Ok(Json(CommandView::from(record)))
}

/// Device poll. Credentials travel with every request; a rejected pair is
/// a 403 regardless of whether the device exists.
pub async fn poll_handler(
    State(state): State<ServerState>,
    Query(query): Query<PollQuery>,
) -> Result<Json<PollResponse>, ApiError> {
    let outcome = state
        .service
        .poll_command(&query.device_id, &query.secret)
        .await?;
    let response = match outcome {
        PollOutcome::Delivered(cmd) => PollResponse {
            command: Some(cmd.payload),
            command_id: Some(cmd.id),
        },
        PollOutcome::Empty => PollResponse {
            command: None,
            command_id: None,
        },
    };
    Ok(Json(response))
}

/// Pending commands for a device, oldest first.
pub async fn list_pending_handler(
    State(state): State<ServerState>,
    Query(query): Query<DeviceQuery>,
) -> Result<Json<Vec<CommandView>>, ApiError> {
    let pending = state.service.list_pending(&query.device_id)?;
    Ok(Json(pending.into_iter().map(CommandView::from).collect()))
}

/// Cancel a pending command. 404 when it was already delivered or never
/// existed.
pub async fn remove_command_handler(
    State(state): State<ServerState>,
    Json(req): Json<RemoveCommandRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if state.service.remove_command(req.command_id).await? {
        Ok(Json(serde_json::json!({"removed": req.command_id})))
    } else {
        Err(ApiError(Error::not_found(format!(
            "command {}",
            req.command_id
        ))))
    }
}

/// Replace a device's entire pending queue with a new batch.
pub async fn load_commands_handler(
    State(state): State<ServerState>,
    Json(req): Json<LoadCommandsRequest>,
) -> Result<Json<Vec<CommandView>>, ApiError> {
    let records = state
        .service
        .load_commands(&req.device_id, &req.commands)
        .await?;
    Ok(Json(records.into_iter().map(CommandView::from).collect()))
}
