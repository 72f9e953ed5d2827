//! Dispatch service: the façade the transport layer talks to.
//!
//! Each operation follows the same shape: mutate the primary store,
//! append to the activity log where the operation is auditable, then
//! mirror the committed mutations to the secondaries. Mirroring happens
//! strictly after the primary commit and can only add log noise, never
//! change the outcome.

use std::sync::Arc;

use boardlink_core::error::{Error, Result};
use boardlink_storage::{CommandRecord, DeviceRecord, DispatchStore, LogRecord};

use crate::activity::{actions, ActivityLog};
use crate::queue::CommandQueue;
use crate::registry::DeviceRegistry;
use crate::replication::{MirrorOp, ReplicationCoordinator};

/// Result of a device poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The oldest pending command, now removed from the queue. This is the
    /// only copy the device will ever receive.
    Delivered(CommandRecord),
    /// Queue was empty. The check-in still counts for liveness.
    Empty,
}

impl PollOutcome {
    pub fn command(&self) -> Option<&CommandRecord> {
        match self {
            PollOutcome::Delivered(cmd) => Some(cmd),
            PollOutcome::Empty => None,
        }
    }
}

/// Liveness view of one device, for operator dashboards.
#[derive(Debug, Clone)]
pub struct DeviceLiveness {
    pub device_id: String,
    pub last_seen: i64,
    pub last_request_time: Option<i64>,
    pub pending_commands: usize,
}

/// Ties registry, queue, activity log, and replication together.
pub struct DispatchService {
    registry: DeviceRegistry,
    queue: CommandQueue,
    activity: ActivityLog,
    replication: ReplicationCoordinator,
}

impl DispatchService {
    pub fn new(store: Arc<DispatchStore>, replication: ReplicationCoordinator) -> Self {
        Self {
            registry: DeviceRegistry::new(store.clone()),
            queue: CommandQueue::new(store.clone()),
            activity: ActivityLog::new(store),
            replication,
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    // ========== Devices ==========

    /// Register a device under an operator's account. `Conflict` when the
    /// id is already taken.
    pub async fn register_device(
        &self,
        device_id: &str,
        secret: &str,
        owner: &str,
    ) -> Result<DeviceRecord> {
        if device_id.is_empty() {
            return Err(Error::validation("device_id must not be empty"));
        }
        if secret.is_empty() {
            return Err(Error::validation("secret must not be empty"));
        }
        let record = self.registry.register(device_id, secret, owner)?;

        let log = self
            .activity
            .append(device_id, actions::DEVICE_REGISTERED, None);
        self.replication
            .mirror(&MirrorOp::DeviceRegistered(record.clone()))
            .await;
        if let Some(entry) = log {
            self.replication.mirror(&MirrorOp::LogAppended(entry)).await;
        }
        Ok(record)
    }

    pub fn list_devices(&self) -> Result<Vec<DeviceRecord>> {
        self.registry.list()
    }

    /// Devices that checked in within the last `window_secs` seconds.
    pub fn active_devices(&self, window_secs: i64) -> Result<Vec<DeviceRecord>> {
        let cutoff = chrono::Utc::now().timestamp() - window_secs;
        self.registry.active_since(cutoff)
    }

    /// Liveness timestamps plus queue depth for one device.
    pub fn device_liveness(&self, device_id: &str) -> Result<DeviceLiveness> {
        let device = self.registry.require(device_id)?;
        let pending = self.queue.list_pending(device_id)?;
        Ok(DeviceLiveness {
            device_id: device.device_id,
            last_seen: device.last_seen,
            last_request_time: device.last_request_time,
            pending_commands: pending.len(),
        })
    }

    // ========== Command dispatch ==========

    /// Device poll: authenticate, then atomically pop the oldest pending
    /// command. `last_seen` advances on every authenticated poll;
    /// `last_request_time` only when a command was actually handed out.
    pub async fn poll_command(&self, device_id: &str, secret: &str) -> Result<PollOutcome> {
        if !self.registry.authenticate(device_id, secret)? {
            return Err(Error::Auth);
        }

        let now = chrono::Utc::now().timestamp();
        let popped = self.queue.dequeue_next(device_id)?;
        let requested = popped.as_ref().map(|_| now);
        self.registry.touch(device_id, now, requested)?;

        self.replication
            .mirror(&MirrorOp::DeviceTouched {
                device_id: device_id.to_string(),
                seen: now,
                requested,
            })
            .await;

        match popped {
            Some(command) => {
                tracing::info!(device_id, command_id = command.id, "Command delivered");
                let log = self
                    .activity
                    .append(device_id, actions::COMMAND_DELIVERED, Some(command.id));
                self.replication
                    .mirror(&MirrorOp::CommandDelivered {
                        device_id: device_id.to_string(),
                        command_id: command.id,
                    })
                    .await;
                if let Some(entry) = log {
                    self.replication.mirror(&MirrorOp::LogAppended(entry)).await;
                }
                Ok(PollOutcome::Delivered(command))
            }
            None => {
                let log = self.activity.append(device_id, actions::CHECK_IN, None);
                if let Some(entry) = log {
                    self.replication.mirror(&MirrorOp::LogAppended(entry)).await;
                }
                Ok(PollOutcome::Empty)
            }
        }
    }

    /// Queue a command for a device. `NotFound` when the device is unknown.
    /// The payload is opaque; an empty string is a valid command, delivered
    /// as such and distinct from an empty queue.
    pub async fn enqueue_command(&self, device_id: &str, payload: &str) -> Result<CommandRecord> {
        let record = self.queue.enqueue(device_id, payload)?;

        let log = self
            .activity
            .append(device_id, actions::COMMAND_ENQUEUED, Some(record.id));
        self.replication
            .mirror(&MirrorOp::CommandEnqueued(record.clone()))
            .await;
        if let Some(entry) = log {
            self.replication.mirror(&MirrorOp::LogAppended(entry)).await;
        }
        Ok(record)
    }

    /// Pending commands for a device, oldest first. `NotFound` when the
    /// device is unknown.
    pub fn list_pending(&self, device_id: &str) -> Result<Vec<CommandRecord>> {
        self.registry.require(device_id)?;
        self.queue.list_pending(device_id)
    }

    /// Administrative cancel by command id. Returns `true` when a pending
    /// command was removed, `false` when it was already delivered or never
    /// existed.
    pub async fn remove_command(&self, command_id: u64) -> Result<bool> {
        match self.queue.remove_by_id(command_id)? {
            Some(device_id) => {
                let log = self
                    .activity
                    .append(&device_id, actions::COMMAND_REMOVED, Some(command_id));
                self.replication
                    .mirror(&MirrorOp::CommandRemoved {
                        device_id,
                        command_id,
                    })
                    .await;
                if let Some(entry) = log {
                    self.replication.mirror(&MirrorOp::LogAppended(entry)).await;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Replace a device's entire pending queue with a new batch.
    pub async fn load_commands(
        &self,
        device_id: &str,
        payloads: &[String],
    ) -> Result<Vec<CommandRecord>> {
        let records = self.queue.replace_all(device_id, payloads)?;

        let log = self
            .activity
            .append(device_id, actions::COMMANDS_REPLACED, None);
        self.replication
            .mirror(&MirrorOp::CommandsReplaced {
                device_id: device_id.to_string(),
                commands: records.clone(),
            })
            .await;
        if let Some(entry) = log {
            self.replication.mirror(&MirrorOp::LogAppended(entry)).await;
        }
        Ok(records)
    }

    // ========== Activity ==========

    pub fn recent_activity(&self, limit: usize) -> Result<Vec<LogRecord>> {
        self.activity.recent(limit)
    }

    pub fn device_activity(&self, device_id: &str, limit: usize) -> Result<Vec<LogRecord>> {
        self.registry.require(device_id)?;
        self.activity.for_device(device_id, limit)
    }
}
