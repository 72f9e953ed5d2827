//! Command dispatch core.
//!
//! Provides:
//! - Device identity, credential verification, and liveness tracking
//! - Per-device FIFO command queues with atomic at-most-once dequeue
//! - Best-effort mirroring of committed mutations to secondary stores
//! - An append-only activity log for audit
//! - The `DispatchService` façade that ties the pieces together

pub mod activity;
pub mod queue;
pub mod registry;
pub mod replication;
pub mod service;

// Re-exports
pub use activity::ActivityLog;
pub use queue::CommandQueue;
pub use registry::DeviceRegistry;
pub use replication::{MirrorOp, RedbSecondary, ReplicationCoordinator, SecondaryStore};
pub use service::{DeviceLiveness, DispatchService, PollOutcome};

pub use boardlink_storage::{CommandRecord, DeviceRecord, DispatchStore, LogRecord};
