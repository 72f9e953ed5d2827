//! Operator account handlers: signup, login, logout.

use axum::{
    extract::{Extension, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};

use crate::auth::{AuthError, SessionInfo};
use crate::models::{LoginRequest, LoginResponse, RegisterOperatorRequest};
use crate::server::ServerState;

/// Create an operator account. Gated by the registration key when one is
/// configured.
pub async fn register_operator_handler(
    State(state): State<ServerState>,
    Json(req): Json<RegisterOperatorRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AuthError> {
    let operator = state.auth.register_operator(
        &req.username,
        &req.password,
        req.email,
        req.registration_key.as_deref(),
    )?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": operator.id,
            "username": operator.username,
        })),
    ))
}

/// Authenticate an operator and mint a session token.
pub async fn login_handler(
    State(state): State<ServerState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let token = state.auth.login(&req.username, &req.password).await?;
    Ok(Json(LoginResponse { token }))
}

/// Revoke the presented session token.
pub async fn logout_handler(
    State(state): State<ServerState>,
    Extension(session): Extension<SessionInfo>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AuthError> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingToken)?;

    state.auth.logout(token).await;
    tracing::info!(username = %session.username, "Operator logged out");
    Ok(Json(serde_json::json!({"message": "Logged out"})))
}
