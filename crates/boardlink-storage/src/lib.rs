//! Durable storage for the Boardlink dispatch core.
//!
//! A single `redb` database holds devices, queued commands, operators, and
//! the append-only activity log. Every mutation is one write transaction;
//! `redb`'s single-writer model is what makes the dequeue-next operation an
//! atomic select-and-delete.

pub mod error;
pub mod store;

pub use error::{Error, Result};
pub use store::{
    CommandRecord, DeviceRecord, DispatchStore, LogRecord, OperatorRecord,
};
