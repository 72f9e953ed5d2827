//! HTTP server wiring.

pub mod router;
pub mod types;

pub use router::create_router_with_state;
pub use types::ServerState;

use boardlink_core::error::{Error, Result};

/// Bind and serve until the process is stopped.
pub async fn serve(state: ServerState, bind_addr: &str) -> Result<()> {
    let router = create_router_with_state(state);
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|e| Error::config(format!("failed to bind {}: {}", bind_addr, e)))?;
    tracing::info!(addr = bind_addr, "Listening");
    axum::serve(listener, router)
        .await
        .map_err(|e| Error::internal(e.to_string()))?;
    Ok(())
}
