//! Append-only activity log.
//!
//! Log writes are fire-and-forget: a failed append is reported through
//! tracing and swallowed, so audit logging can never break the dispatch
//! path. Liveness questions are answered from the registry's timestamps,
//! not by scanning the log.

use std::sync::Arc;

use boardlink_core::error::Result;
use boardlink_storage::{DispatchStore, LogRecord};

/// Action names recorded by the dispatch path.
pub mod actions {
    pub const CHECK_IN: &str = "check-in";
    pub const COMMAND_DELIVERED: &str = "command-delivered";
    pub const COMMAND_ENQUEUED: &str = "command-enqueued";
    pub const COMMAND_REMOVED: &str = "command-removed";
    pub const COMMANDS_REPLACED: &str = "commands-replaced";
    pub const DEVICE_REGISTERED: &str = "device-registered";
}

/// Owns LogEntry rows; appends, never mutates or deletes.
#[derive(Clone)]
pub struct ActivityLog {
    store: Arc<DispatchStore>,
}

impl ActivityLog {
    pub fn new(store: Arc<DispatchStore>) -> Self {
        Self { store }
    }

    /// Durably append one entry. Returns the written record so the caller
    /// can mirror it, or `None` when the write failed (already logged).
    pub fn append(
        &self,
        device_id: &str,
        action: &str,
        command_id: Option<u64>,
    ) -> Option<LogRecord> {
        let now = chrono::Utc::now().timestamp();
        match self.store.append_log(now, device_id, action, command_id) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(device_id, action, error = %e, "Activity log append failed");
                None
            }
        }
    }

    /// Most recent entries across all devices, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<LogRecord>> {
        Ok(self.store.recent_logs(limit)?)
    }

    /// Entries for one device, newest first.
    pub fn for_device(&self, device_id: &str, limit: usize) -> Result<Vec<LogRecord>> {
        Ok(self.store.logs_for_device(device_id, limit)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DispatchStore::open(dir.path().join("l.redb")).unwrap());
        let log = ActivityLog::new(store);

        assert!(log.append("esp32_1", actions::CHECK_IN, None).is_some());
        assert!(log
            .append("esp32_1", actions::COMMAND_DELIVERED, Some(3))
            .is_some());

        let entries = log.for_device("esp32_1", 10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, actions::COMMAND_DELIVERED);
        assert_eq!(entries[1].action, actions::CHECK_IN);
    }
}
