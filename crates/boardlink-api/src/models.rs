//! Request/response types and the error-to-status mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

use boardlink_core::error::Error;
use boardlink_storage::{CommandRecord, DeviceRecord, LogRecord};

/// Wrapper that turns a core error into an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            // Duplicate registrations read as plain bad requests.
            Error::Conflict(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            // Device credential rejection: no detail leaks.
            Error::Auth => (StatusCode::FORBIDDEN, self.0.to_string()),
            Error::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            _ => {
                tracing::error!(error = %self.0, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}

// ========== Requests ==========

#[derive(Debug, Deserialize)]
pub struct RegisterDeviceRequest {
    pub device_id: String,
    pub secret: String,
}

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub device_id: String,
    pub payload: String,
}

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    pub device_id: String,
    pub secret: String,
}

#[derive(Debug, Deserialize)]
pub struct DeviceQuery {
    pub device_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ActiveQuery {
    pub window_secs: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveCommandRequest {
    pub command_id: u64,
}

#[derive(Debug, Deserialize)]
pub struct LoadCommandsRequest {
    pub device_id: String,
    pub commands: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterOperatorRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub registration_key: Option<String>,
}

// ========== Responses ==========

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Poll response. `command` is `null` when the queue was empty, which is
/// distinct from a delivered empty-string payload.
#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_id: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct CommandView {
    pub id: u64,
    pub device_id: String,
    pub payload: String,
    pub created_at: i64,
}

impl From<CommandRecord> for CommandView {
    fn from(record: CommandRecord) -> Self {
        Self {
            id: record.id,
            device_id: record.device_id,
            payload: record.payload,
            created_at: record.created_at,
        }
    }
}

/// Device view. The secret hash never leaves the server.
#[derive(Debug, Serialize)]
pub struct DeviceView {
    pub device_id: String,
    pub owner: String,
    pub created_at: i64,
    pub last_seen: i64,
    pub last_request_time: Option<i64>,
}

impl From<DeviceRecord> for DeviceView {
    fn from(record: DeviceRecord) -> Self {
        Self {
            device_id: record.device_id,
            owner: record.owner,
            created_at: record.created_at,
            last_seen: record.last_seen,
            last_request_time: record.last_request_time,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub device_id: String,
    pub last_seen: i64,
    pub last_request_time: Option<i64>,
    pub pending_commands: usize,
}

#[derive(Debug, Serialize)]
pub struct LogEntryView {
    pub id: u64,
    pub timestamp: i64,
    pub device_id: String,
    pub action: String,
    pub command_id: Option<u64>,
}

impl From<LogRecord> for LogEntryView {
    fn from(record: LogRecord) -> Self {
        Self {
            id: record.id,
            timestamp: record.timestamp,
            device_id: record.device_id,
            action: record.action,
            command_id: record.command_id,
        }
    }
}
