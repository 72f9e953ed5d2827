//! Handler-level tests over a real store in a temp directory.

use std::sync::Arc;

use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::Json;

use boardlink_api::auth::{AuthGateway, SessionInfo};
use boardlink_api::handlers::{commands, devices, operators};
use boardlink_api::models::{
    DeviceQuery, EnqueueRequest, LoadCommandsRequest, LoginRequest, PollQuery,
    RegisterDeviceRequest, RegisterOperatorRequest, RemoveCommandRequest,
};
use boardlink_api::ServerState;
use boardlink_dispatch::{DispatchService, DispatchStore, ReplicationCoordinator};

fn test_state(dir: &tempfile::TempDir, registration_key: Option<&str>) -> ServerState {
    let store = Arc::new(DispatchStore::open(dir.path().join("api.redb")).unwrap());
    let service = Arc::new(DispatchService::new(
        store.clone(),
        ReplicationCoordinator::disabled(),
    ));
    let auth = AuthGateway::new(store, registration_key.map(String::from), 3600);
    ServerState::new(service, auth)
}

fn operator_session() -> SessionInfo {
    SessionInfo {
        operator_id: "op-1".to_string(),
        username: "alice".to_string(),
        created_at: 0,
        expires_at: i64::MAX,
    }
}

async fn register_device(state: &ServerState, device_id: &str, secret: &str) {
    devices::register_device_handler(
        State(state.clone()),
        Extension(operator_session()),
        Json(RegisterDeviceRequest {
            device_id: device_id.to_string(),
            secret: secret.to_string(),
        }),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_register_then_poll_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir, None);
    register_device(&state, "esp32_1", "s1").await;

    commands::enqueue_handler(
        State(state.clone()),
        Extension(operator_session()),
        Json(EnqueueRequest {
            device_id: "esp32_1".to_string(),
            payload: "LED_ON".to_string(),
        }),
    )
    .await
    .unwrap();

    let Json(response) = commands::poll_handler(
        State(state.clone()),
        Query(PollQuery {
            device_id: "esp32_1".to_string(),
            secret: "s1".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(response.command.as_deref(), Some("LED_ON"));

    // Queue drained: next poll reports null, not an error.
    let Json(response) = commands::poll_handler(
        State(state),
        Query(PollQuery {
            device_id: "esp32_1".to_string(),
            secret: "s1".to_string(),
        }),
    )
    .await
    .unwrap();
    assert!(response.command.is_none());
}

#[tokio::test]
async fn test_poll_with_bad_credentials_is_forbidden() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir, None);
    register_device(&state, "esp32_1", "s1").await;

    for (device_id, secret) in [("esp32_1", "wrong"), ("ghost", "s1")] {
        let err = commands::poll_handler(
            State(state.clone()),
            Query(PollQuery {
                device_id: device_id.to_string(),
                secret: secret.to_string(),
            }),
        )
        .await
        .unwrap_err();
        let response = axum::response::IntoResponse::into_response(err);
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}

#[tokio::test]
async fn test_duplicate_device_registration_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir, None);
    register_device(&state, "esp32_1", "s1").await;

    let err = devices::register_device_handler(
        State(state),
        Extension(operator_session()),
        Json(RegisterDeviceRequest {
            device_id: "esp32_1".to_string(),
            secret: "other".to_string(),
        }),
    )
    .await
    .unwrap_err();
    let response = axum::response::IntoResponse::into_response(err);
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_enqueue_for_unknown_device_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir, None);

    let err = commands::enqueue_handler(
        State(state),
        Extension(operator_session()),
        Json(EnqueueRequest {
            device_id: "ghost".to_string(),
            payload: "LED_ON".to_string(),
        }),
    )
    .await
    .unwrap_err();
    let response = axum::response::IntoResponse::into_response(err);
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_remove_command_maps_missing_to_404() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir, None);
    register_device(&state, "esp32_1", "s1").await;

    let Json(cmd) = commands::enqueue_handler(
        State(state.clone()),
        Extension(operator_session()),
        Json(EnqueueRequest {
            device_id: "esp32_1".to_string(),
            payload: "REBOOT".to_string(),
        }),
    )
    .await
    .unwrap();

    commands::remove_command_handler(
        State(state.clone()),
        Json(RemoveCommandRequest { command_id: cmd.id }),
    )
    .await
    .unwrap();

    let err = commands::remove_command_handler(
        State(state),
        Json(RemoveCommandRequest { command_id: cmd.id }),
    )
    .await
    .unwrap_err();
    let response = axum::response::IntoResponse::into_response(err);
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_load_commands_replaces_pending_set() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir, None);
    register_device(&state, "esp32_1", "s1").await;

    commands::enqueue_handler(
        State(state.clone()),
        Extension(operator_session()),
        Json(EnqueueRequest {
            device_id: "esp32_1".to_string(),
            payload: "STALE".to_string(),
        }),
    )
    .await
    .unwrap();

    commands::load_commands_handler(
        State(state.clone()),
        Json(LoadCommandsRequest {
            device_id: "esp32_1".to_string(),
            commands: vec!["A".to_string(), "B".to_string()],
        }),
    )
    .await
    .unwrap();

    let Json(pending) = commands::list_pending_handler(
        State(state),
        Query(DeviceQuery {
            device_id: "esp32_1".to_string(),
        }),
    )
    .await
    .unwrap();
    let payloads: Vec<&str> = pending.iter().map(|c| c.payload.as_str()).collect();
    assert_eq!(payloads, vec!["A", "B"]);
}

#[tokio::test]
async fn test_operator_signup_and_login_flow() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir, Some("fleet-key"));

    // Bad key is forbidden.
    let err = operators::register_operator_handler(
        State(state.clone()),
        Json(RegisterOperatorRequest {
            username: "alice".to_string(),
            password: "correct-horse".to_string(),
            email: None,
            registration_key: Some("nope".to_string()),
        }),
    )
    .await
    .unwrap_err();
    let response = axum::response::IntoResponse::into_response(err);
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let (status, _) = operators::register_operator_handler(
        State(state.clone()),
        Json(RegisterOperatorRequest {
            username: "alice".to_string(),
            password: "correct-horse".to_string(),
            email: Some("alice@example.com".to_string()),
            registration_key: Some("fleet-key".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);

    let Json(login) = operators::login_handler(
        State(state.clone()),
        Json(LoginRequest {
            username: "alice".to_string(),
            password: "correct-horse".to_string(),
        }),
    )
    .await
    .unwrap();
    assert!(state.auth.require_session(&login.token).await.is_ok());

    assert!(state.auth.logout(&login.token).await);
    assert!(state.auth.require_session(&login.token).await.is_err());
}

#[tokio::test]
async fn test_last_seen_tracks_polls() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir, None);
    register_device(&state, "esp32_1", "s1").await;

    commands::poll_handler(
        State(state.clone()),
        Query(PollQuery {
            device_id: "esp32_1".to_string(),
            secret: "s1".to_string(),
        }),
    )
    .await
    .unwrap();

    let Json(live) = devices::last_seen_handler(
        State(state),
        Query(DeviceQuery {
            device_id: "esp32_1".to_string(),
        }),
    )
    .await
    .unwrap();
    assert!(live.last_seen > 0);
    // Empty poll: check-in only, no command delivered.
    assert_eq!(live.last_request_time, None);
    assert_eq!(live.pending_commands, 0);
}
