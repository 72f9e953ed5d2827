//! Per-device FIFO command queues.
//!
//! The queue is a thin domain layer over the durable store; it holds no
//! in-process state that could diverge from it. Ordering and the
//! at-most-once pop guarantee come from the store's transactional
//! select-and-delete.

use std::sync::Arc;

use boardlink_core::error::Result;
use boardlink_storage::{CommandRecord, DispatchStore};

/// Owns Command rows and is the only component that deletes them.
#[derive(Clone)]
pub struct CommandQueue {
    store: Arc<DispatchStore>,
}

impl CommandQueue {
    pub fn new(store: Arc<DispatchStore>) -> Self {
        Self { store }
    }

    /// Append a command for a device. Fails with `NotFound` when the device
    /// has never been registered; there is no auto-provisioning.
    pub fn enqueue(&self, device_id: &str, payload: &str) -> Result<CommandRecord> {
        let now = chrono::Utc::now().timestamp();
        let record = self.store.enqueue_command(device_id, payload, now)?;
        tracing::debug!(device_id, command_id = record.id, "Command enqueued");
        Ok(record)
    }

    /// Atomically pop the oldest pending command, or `None` when the queue
    /// is empty. Each command is handed to at most one caller, ever.
    pub fn dequeue_next(&self, device_id: &str) -> Result<Option<CommandRecord>> {
        Ok(self.store.dequeue_next(device_id)?)
    }

    /// Pending commands in delivery order. Read-only, diagnostic.
    pub fn list_pending(&self, device_id: &str) -> Result<Vec<CommandRecord>> {
        Ok(self.store.list_pending(device_id)?)
    }

    /// Administrative cancel. Returns the owning device id, or `None` when
    /// the command was already delivered or removed -- that race is benign.
    pub fn remove_by_id(&self, command_id: u64) -> Result<Option<String>> {
        Ok(self.store.remove_command(command_id)?)
    }

    /// Transactionally swap a device's pending set for a new batch.
    pub fn replace_all(&self, device_id: &str, payloads: &[String]) -> Result<Vec<CommandRecord>> {
        let now = chrono::Utc::now().timestamp();
        Ok(self.store.replace_commands(device_id, payloads, now)?)
    }
}
