//! Server state shared across all handlers.

use std::sync::Arc;

use boardlink_dispatch::DispatchService;

use crate::auth::AuthGateway;

/// Default liveness window for `/active_devices` (seconds).
pub const DEFAULT_ACTIVE_WINDOW_SECS: i64 = 120;

/// Cap on activity-log page sizes.
pub const MAX_LOG_LIMIT: usize = 500;

#[derive(Clone)]
pub struct ServerState {
    /// Dispatch core: registry, queues, activity log, replication.
    pub service: Arc<DispatchService>,

    /// Operator accounts and sessions.
    pub auth: AuthGateway,

    /// Server start timestamp.
    pub started_at: i64,
}

impl ServerState {
    pub fn new(service: Arc<DispatchService>, auth: AuthGateway) -> Self {
        Self {
            service,
            auth,
            started_at: chrono::Utc::now().timestamp(),
        }
    }
}
