//! Application router configuration.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::auth::session_auth_middleware;
use crate::handlers::{basic, commands, devices, operators};

use super::types::ServerState;

/// Create the application router.
pub fn create_router_with_state(state: ServerState) -> Router {
    // Public routes: health, operator login/signup, and the device poll
    // endpoint (devices authenticate per call, not per session).
    let public_routes = Router::new()
        .route("/health", get(basic::health_handler))
        .route("/login", post(operators::login_handler))
        .route("/register_user", post(operators::register_operator_handler))
        .route("/get_command", get(commands::poll_handler));

    // Operator routes behind session auth.
    let protected_routes = Router::new()
        .route("/logout", post(operators::logout_handler))
        .route("/register_device", post(devices::register_device_handler))
        .route("/command", post(commands::enqueue_handler))
        .route("/commands", get(commands::list_pending_handler))
        .route("/remove_command", post(commands::remove_command_handler))
        .route("/loaded_command", post(commands::load_commands_handler))
        .route("/last_seen", get(devices::last_seen_handler))
        .route("/devices", get(devices::list_devices_handler))
        .route("/active_devices", get(devices::active_devices_handler))
        .route("/logs", get(devices::recent_logs_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            session_auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
