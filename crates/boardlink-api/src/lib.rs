//! HTTP surface for the dispatch service.
//!
//! Two credential domains, deliberately separate:
//! - Operators hold bcrypt-hashed passwords and bearer-token sessions.
//! - Devices present `(device_id, secret)` on every poll; there is no
//!   device session state.

pub mod auth;
pub mod handlers;
pub mod models;
pub mod server;

pub use auth::{AuthError, AuthGateway, SessionInfo};
pub use server::{create_router_with_state, serve, ServerState};
