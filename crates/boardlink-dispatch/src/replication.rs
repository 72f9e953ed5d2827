//! Best-effort mirroring of committed mutations to secondary stores.
//!
//! The primary store is the source of truth. After a mutation commits
//! there, the same logical operation is replayed against each configured
//! secondary. A secondary that fails or times out is logged and skipped;
//! it never fails the caller's request and never rolls back the primary.
//! Secondaries can therefore lag or diverge, and nothing here reconciles
//! them.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use boardlink_core::error::Result;
use boardlink_storage::{CommandRecord, DeviceRecord, DispatchStore, LogRecord};

/// One committed mutation, in replayable form.
#[derive(Debug, Clone)]
pub enum MirrorOp {
    DeviceRegistered(DeviceRecord),
    DeviceTouched {
        device_id: String,
        seen: i64,
        requested: Option<i64>,
    },
    CommandEnqueued(CommandRecord),
    CommandDelivered {
        device_id: String,
        command_id: u64,
    },
    CommandRemoved {
        device_id: String,
        command_id: u64,
    },
    CommandsReplaced {
        device_id: String,
        commands: Vec<CommandRecord>,
    },
    LogAppended(LogRecord),
}

impl MirrorOp {
    /// Short operation name for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            MirrorOp::DeviceRegistered(_) => "device_registered",
            MirrorOp::DeviceTouched { .. } => "device_touched",
            MirrorOp::CommandEnqueued(_) => "command_enqueued",
            MirrorOp::CommandDelivered { .. } => "command_delivered",
            MirrorOp::CommandRemoved { .. } => "command_removed",
            MirrorOp::CommandsReplaced { .. } => "commands_replaced",
            MirrorOp::LogAppended(_) => "log_appended",
        }
    }
}

/// A secondary that can replay committed mutations.
#[async_trait]
pub trait SecondaryStore: Send + Sync {
    /// Identifier used in log lines.
    fn name(&self) -> &str;

    /// Replay one operation. Implementations must be idempotent: the same
    /// op may be applied more than once after partial failures.
    async fn apply(&self, op: &MirrorOp) -> Result<()>;
}

/// Secondary backed by another redb database, usually on a different disk.
pub struct RedbSecondary {
    name: String,
    store: DispatchStore,
}

impl RedbSecondary {
    pub fn open<P: AsRef<Path>>(name: impl Into<String>, path: P) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            store: DispatchStore::open(path)?,
        })
    }
}

#[async_trait]
impl SecondaryStore for RedbSecondary {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, op: &MirrorOp) -> Result<()> {
        match op {
            MirrorOp::DeviceRegistered(record) => self.store.put_device(record)?,
            MirrorOp::DeviceTouched {
                device_id,
                seen,
                requested,
            } => {
                self.store.touch_device(device_id, *seen, *requested)?;
            }
            MirrorOp::CommandEnqueued(record) => self.store.put_command(record)?,
            MirrorOp::CommandDelivered { command_id, .. }
            | MirrorOp::CommandRemoved { command_id, .. } => {
                self.store.remove_command(*command_id)?;
            }
            MirrorOp::CommandsReplaced {
                device_id,
                commands,
            } => {
                self.store.clear_commands(device_id)?;
                for record in commands {
                    self.store.put_command(record)?;
                }
            }
            MirrorOp::LogAppended(record) => self.store.put_log(record)?,
        }
        Ok(())
    }
}

/// Fans committed mutations out to every configured secondary.
pub struct ReplicationCoordinator {
    secondaries: Vec<Arc<dyn SecondaryStore>>,
    timeout: Duration,
}

impl ReplicationCoordinator {
    pub fn new(secondaries: Vec<Arc<dyn SecondaryStore>>, timeout: Duration) -> Self {
        Self {
            secondaries,
            timeout,
        }
    }

    /// Coordinator with no secondaries; every mirror call is a no-op.
    pub fn disabled() -> Self {
        Self::new(Vec::new(), Duration::from_secs(0))
    }

    pub fn is_enabled(&self) -> bool {
        !self.secondaries.is_empty()
    }

    /// Replay `op` on every secondary. Failures and timeouts are logged
    /// per secondary and swallowed.
    pub async fn mirror(&self, op: &MirrorOp) {
        for secondary in &self.secondaries {
            match tokio::time::timeout(self.timeout, secondary.apply(op)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(
                        secondary = secondary.name(),
                        op = op.kind(),
                        error = %e,
                        "Secondary replay failed"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        secondary = secondary.name(),
                        op = op.kind(),
                        timeout_ms = self.timeout.as_millis() as u64,
                        "Secondary replay timed out"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardlink_core::error::Error;

    struct FailingSecondary;

    #[async_trait]
    impl SecondaryStore for FailingSecondary {
        fn name(&self) -> &str {
            "failing"
        }

        async fn apply(&self, _op: &MirrorOp) -> Result<()> {
            Err(Error::replication("disk on fire"))
        }
    }

    fn sample_device() -> DeviceRecord {
        DeviceRecord {
            device_id: "esp32_1".to_string(),
            secret_hash: "ab".repeat(32),
            owner: "alice".to_string(),
            created_at: 1,
            last_seen: 1,
            last_request_time: None,
        }
    }

    #[tokio::test]
    async fn test_redb_secondary_replays_command_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let secondary = RedbSecondary::open("mirror", dir.path().join("m.redb")).unwrap();

        secondary
            .apply(&MirrorOp::DeviceRegistered(sample_device()))
            .await
            .unwrap();
        let cmd = CommandRecord {
            id: 1,
            device_id: "esp32_1".to_string(),
            payload: "LED_ON".to_string(),
            created_at: 2,
        };
        secondary
            .apply(&MirrorOp::CommandEnqueued(cmd.clone()))
            .await
            .unwrap();
        assert_eq!(secondary.store.list_pending("esp32_1").unwrap(), vec![cmd]);

        secondary
            .apply(&MirrorOp::CommandDelivered {
                device_id: "esp32_1".to_string(),
                command_id: 1,
            })
            .await
            .unwrap();
        assert!(secondary.store.list_pending("esp32_1").unwrap().is_empty());

        // Replaying the delete again is harmless.
        secondary
            .apply(&MirrorOp::CommandDelivered {
                device_id: "esp32_1".to_string(),
                command_id: 1,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_redb_secondary_replays_batch_replace() {
        let dir = tempfile::tempdir().unwrap();
        let secondary = RedbSecondary::open("mirror", dir.path().join("m.redb")).unwrap();
        secondary
            .apply(&MirrorOp::DeviceRegistered(sample_device()))
            .await
            .unwrap();
        secondary
            .apply(&MirrorOp::CommandEnqueued(CommandRecord {
                id: 1,
                device_id: "esp32_1".to_string(),
                payload: "STALE".to_string(),
                created_at: 1,
            }))
            .await
            .unwrap();

        let batch = vec![
            CommandRecord {
                id: 2,
                device_id: "esp32_1".to_string(),
                payload: "NEW_1".to_string(),
                created_at: 2,
            },
            CommandRecord {
                id: 3,
                device_id: "esp32_1".to_string(),
                payload: "NEW_2".to_string(),
                created_at: 2,
            },
        ];
        secondary
            .apply(&MirrorOp::CommandsReplaced {
                device_id: "esp32_1".to_string(),
                commands: batch.clone(),
            })
            .await
            .unwrap();
        assert_eq!(secondary.store.list_pending("esp32_1").unwrap(), batch);
    }

    #[tokio::test]
    async fn test_failing_secondary_is_swallowed() {
        let coordinator = ReplicationCoordinator::new(
            vec![Arc::new(FailingSecondary)],
            Duration::from_millis(100),
        );
        // Must return normally despite the failure.
        coordinator
            .mirror(&MirrorOp::DeviceRegistered(sample_device()))
            .await;
    }

    #[tokio::test]
    async fn test_healthy_secondary_still_applied_after_failing_one() {
        let dir = tempfile::tempdir().unwrap();
        let healthy =
            Arc::new(RedbSecondary::open("healthy", dir.path().join("h.redb")).unwrap());
        let coordinator = ReplicationCoordinator::new(
            vec![Arc::new(FailingSecondary), healthy.clone()],
            Duration::from_millis(500),
        );

        coordinator
            .mirror(&MirrorOp::DeviceRegistered(sample_device()))
            .await;
        assert!(healthy.store.get_device("esp32_1").unwrap().is_some());
    }
}
